//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the recognition gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Admission policies, matched by longest path prefix.
    pub routes: Vec<RoutePolicy>,

    /// IP policy, lockout and CSRF settings.
    pub security: SecurityConfig,

    /// Authentication token settings.
    pub auth: AuthConfig,

    /// Usage ledger sizing and persistence.
    pub ledger: LedgerConfig,

    /// External recognition engine.
    pub engine: EngineConfig,

    /// Static console accounts and caller keys.
    pub directory: DirectoryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: default_routes(),
            security: SecurityConfig::default(),
            auth: AuthConfig::default(),
            ledger: LedgerConfig::default(),
            engine: EngineConfig::default(),
            directory: DirectoryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:1205").
    pub bind_address: String,

    /// Total time allowed for one request, in seconds.
    pub request_timeout_secs: u64,

    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:1205".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// A single admission check, evaluated in the order listed on the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardStep {
    IpAllowed,
    LockCheck,
    RateLimit,
    Authenticate,
    RequireAdmin,
    Csrf,
}

impl GuardStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardStep::IpAllowed => "ip_allowed",
            GuardStep::LockCheck => "lock_check",
            GuardStep::RateLimit => "rate_limit",
            GuardStep::Authenticate => "authenticate",
            GuardStep::RequireAdmin => "require_admin",
            GuardStep::Csrf => "csrf",
        }
    }
}

/// Which request attribute a rate-limit window is keyed on.
///
/// Caller key and subject fall back to the network address when the
/// request does not carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKey {
    CallerKey,
    Subject,
    #[default]
    Address,
}

/// Sliding-window limit for a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateRule {
    pub max_requests: u32,
    pub window_secs: u64,
    #[serde(default)]
    pub key: RateKey,
}

/// Ordered admission chain bound to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutePolicy {
    /// Route identifier for logging/metrics and rate-limit namespacing.
    pub name: String,

    /// Path prefix to match, on segment boundaries.
    pub path_prefix: String,

    #[serde(default)]
    pub steps: Vec<GuardStep>,

    /// Required when `steps` contains `rate_limit`.
    #[serde(default)]
    pub rate_limit: Option<RateRule>,
}

/// Routes used when the config file does not declare any.
pub fn default_routes() -> Vec<RoutePolicy> {
    use GuardStep::*;
    vec![
        RoutePolicy {
            name: "recognize".into(),
            path_prefix: "/recognize".into(),
            steps: vec![IpAllowed, RateLimit],
            rate_limit: Some(RateRule {
                max_requests: 100,
                window_secs: 60,
                key: RateKey::CallerKey,
            }),
        },
        RoutePolicy {
            name: "login".into(),
            path_prefix: "/admin/login".into(),
            steps: vec![IpAllowed, RateLimit, LockCheck],
            rate_limit: Some(RateRule {
                max_requests: 5,
                window_secs: 60,
                key: RateKey::Address,
            }),
        },
        RoutePolicy {
            name: "admin".into(),
            path_prefix: "/admin".into(),
            steps: vec![IpAllowed, Authenticate, RequireAdmin, Csrf],
            rate_limit: None,
        },
        RoutePolicy {
            name: "public".into(),
            path_prefix: "/".into(),
            steps: vec![RateLimit],
            rate_limit: Some(RateRule {
                max_requests: 100,
                window_secs: 60,
                key: RateKey::Address,
            }),
        },
    ]
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Where IP lists and guard settings are persisted. `None` keeps them in memory.
    pub state_path: Option<PathBuf>,

    /// Honour X-Forwarded-For / X-Real-IP (only behind a trusted proxy).
    pub trust_forwarded_headers: bool,

    /// Guard settings used when no snapshot exists yet.
    pub settings: GuardSettings,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            state_path: Some(PathBuf::from("data/security_config.json")),
            trust_forwarded_headers: false,
            settings: GuardSettings::default(),
        }
    }
}

/// Runtime-tunable IntrusionGuard and CSRF settings.
///
/// Persisted alongside the IP lists and editable from the admin console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardSettings {
    pub enable_allow_list: bool,
    pub enable_deny_list: bool,
    pub max_failures: u32,
    pub failure_window_secs: u64,
    pub lockout_duration_secs: u64,
    pub csrf_enabled: bool,
    pub csrf_lifetime_secs: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            enable_allow_list: false,
            enable_deny_list: true,
            max_failures: 5,
            failure_window_secs: 300,
            lockout_duration_secs: 900,
            csrf_enabled: true,
            csrf_lifetime_secs: 3600,
        }
    }
}

/// Authentication token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Environment variable holding the signing secret.
    pub secret_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 24 * 60 * 60,
            secret_env: "GATEWAY_TOKEN_SECRET".to_string(),
        }
    }
}

/// Usage ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Records kept in memory before the oldest are evicted.
    pub capacity: usize,

    /// Unflushed records that trigger an early flush.
    pub batch_size: usize,

    /// Longest time unflushed records may wait, in seconds.
    pub flush_interval_secs: u64,

    /// Flusher wake-up period in milliseconds.
    pub poll_interval_ms: u64,

    /// Snapshot file. `None` keeps the ledger in memory only.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            batch_size: 10,
            flush_interval_secs: 60,
            poll_interval_ms: 1000,
            snapshot_path: Some(PathBuf::from("data/usage_history.json")),
        }
    }
}

/// External recognition engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Endpoint receiving recognition jobs as JSON.
    pub url: String,

    /// Model name recorded in the usage ledger.
    pub model: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000/recognize".to_string(),
            model: "default".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Static user directory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub accounts: Vec<AccountConfig>,

    /// Caller keys accepted on `/recognize`.
    pub caller_keys: Vec<String>,
}

/// A console account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub user_id: i64,
    pub username: String,
    /// Argon2 PHC string, e.g. from `gateway-cli hash-password`.
    pub password_hash: String,
    #[serde(default = "default_true")]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when RUST_LOG is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "recognition_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
