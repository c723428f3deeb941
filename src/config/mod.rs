//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → GatewayConfig (validated)
//!     → services built from it at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and validates the new file
//!     → new route policies sent to the HTTP server
//!     → atomic swap of the route table
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Only route policies hot reload; everything else is fixed at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    GatewayConfig, GuardSettings, GuardStep, LedgerConfig, ListenerConfig, RateKey, RateRule,
    RoutePolicy, SecurityConfig,
};
pub use watcher::ConfigWatcher;
