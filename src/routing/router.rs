//! Route policy lookup.
//!
//! # Design Decisions
//! - Immutable after construction; hot reload swaps a whole new table
//! - Longest matching prefix wins, ties keep declaration order
//! - O(n) prefix scan (acceptable for typical route counts)

use crate::config::schema::RoutePolicy;
use crate::routing::matcher::PathPrefix;

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(PathPrefix, RoutePolicy)>,
}

impl RouteTable {
    pub fn new(policies: Vec<RoutePolicy>) -> Self {
        let mut routes: Vec<_> = policies
            .into_iter()
            .map(|p| (PathPrefix::new(p.path_prefix.clone()), p))
            .collect();
        // Stable sort keeps declaration order among equal prefixes.
        routes.sort_by(|a, b| b.0.specificity().cmp(&a.0.specificity()));
        Self { routes }
    }

    /// Most specific policy for `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&RoutePolicy> {
        self.routes
            .iter()
            .find(|(prefix, _)| prefix.matches(path))
            .map(|(_, policy)| policy)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn policies(&self) -> impl Iterator<Item = &RoutePolicy> {
        self.routes.iter().map(|(_, policy)| policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::default_routes;

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::new(default_routes());
        assert_eq!(table.resolve("/admin/login").unwrap().name, "login");
        assert_eq!(table.resolve("/admin/security/stats").unwrap().name, "admin");
        assert_eq!(table.resolve("/recognize").unwrap().name, "recognize");
        assert_eq!(table.resolve("/health").unwrap().name, "public");
        assert_eq!(table.resolve("/administrator").unwrap().name, "public");
    }

    #[test]
    fn unmatched_path_has_no_policy() {
        let table = RouteTable::new(vec![RoutePolicy {
            name: "api".into(),
            path_prefix: "/api".into(),
            steps: vec![],
            rate_limit: None,
        }]);
        assert!(table.resolve("/other").is_none());
        assert_eq!(table.len(), 1);
    }
}
