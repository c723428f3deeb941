//! Path prefix matching.
//!
//! # Design Decisions
//! - Matching is case-sensitive
//! - Prefixes match on segment boundaries: `/admin` matches `/admin` and
//!   `/admin/users`, never `/administrator`
//! - No regex, so matching stays linear in the prefix length

/// A normalised path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefix {
    prefix: String,
}

impl PathPrefix {
    /// Trailing slashes are dropped, except for the root prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() { "/".to_owned() } else { trimmed.to_owned() },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Specificity used to order prefixes; longer is more specific.
    pub fn specificity(&self) -> usize {
        self.prefix.len()
    }

    pub fn is_root(&self) -> bool {
        self.prefix == "/"
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.is_root() {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
