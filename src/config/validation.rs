//! Semantic configuration checks.
//!
//! Serde handles syntax and types; this module checks values and cross-field
//! rules, collecting every problem instead of stopping at the first.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, GuardStep, RoutePolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than zero"));
    }

    errors.extend(validate_routes(&config.routes));

    let settings = &config.security.settings;
    for (field, value) in [
        ("security.settings.max_failures", u64::from(settings.max_failures)),
        ("security.settings.failure_window_secs", settings.failure_window_secs),
        ("security.settings.lockout_duration_secs", settings.lockout_duration_secs),
        ("security.settings.csrf_lifetime_secs", settings.csrf_lifetime_secs),
        ("auth.token_ttl_secs", config.auth.token_ttl_secs),
        ("ledger.flush_interval_secs", config.ledger.flush_interval_secs),
        ("ledger.poll_interval_ms", config.ledger.poll_interval_ms),
        ("engine.timeout_secs", config.engine.timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.auth.secret_env.trim().is_empty() {
        errors.push(ValidationError::new("auth.secret_env", "must name an environment variable"));
    }

    let ledger = &config.ledger;
    if ledger.capacity == 0 {
        errors.push(ValidationError::new("ledger.capacity", "must be greater than zero"));
    }
    if ledger.batch_size == 0 || ledger.batch_size > ledger.capacity.max(1) {
        errors.push(ValidationError::new(
            "ledger.batch_size",
            "must be between 1 and ledger.capacity",
        ));
    }

    let mut usernames = HashSet::new();
    for (i, account) in config.directory.accounts.iter().enumerate() {
        if !usernames.insert(account.username.as_str()) {
            errors.push(ValidationError::new(
                format!("directory.accounts[{i}].username"),
                format!("duplicate username {:?}", account.username),
            ));
        }
        if !crate::directory::is_argon2_hash(&account.password_hash) {
            errors.push(ValidationError::new(
                format!("directory.accounts[{i}].password_hash"),
                "must be an Argon2 PHC string",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Route rules, also used when hot-reloading the route table.
pub fn validate_routes(routes: &[RoutePolicy]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for (i, route) in routes.iter().enumerate() {
        let field = |name: &str| format!("routes[{i}].{name}");

        if route.name.trim().is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(field("name"), format!("duplicate route {:?}", route.name)));
        }
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(field("path_prefix"), "must start with '/'"));
        }

        let mut seen = HashSet::new();
        for step in &route.steps {
            if !seen.insert(*step) {
                errors.push(ValidationError::new(
                    field("steps"),
                    format!("{} listed more than once", step.as_str()),
                ));
            }
        }

        let has_rate_step = route.steps.contains(&GuardStep::RateLimit);
        match (&route.rate_limit, has_rate_step) {
            (None, true) => errors.push(ValidationError::new(
                field("rate_limit"),
                "required when steps include rate_limit",
            )),
            (Some(rule), _) => {
                if rule.max_requests == 0 {
                    errors.push(ValidationError::new(field("rate_limit.max_requests"), "must be greater than zero"));
                }
                if rule.window_secs == 0 {
                    errors.push(ValidationError::new(field("rate_limit.window_secs"), "must be greater than zero"));
                }
            }
            (None, false) => {}
        }

        let position = |step: GuardStep| route.steps.iter().position(|s| *s == step);
        if let (Some(csrf), Some(admin)) = (position(GuardStep::Csrf), position(GuardStep::RequireAdmin)) {
            if csrf < admin {
                errors.push(ValidationError::new(
                    field("steps"),
                    "csrf must come after require_admin",
                ));
            }
        }
    }
    errors
}
