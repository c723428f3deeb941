//! Recognition gateway: admission control, intrusion guarding and usage
//! accounting in front of an external recognition engine.

pub mod admin;
pub mod clock;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod persist;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::{PersistError, Rejection};
pub use http::HttpServer;
pub use lifecycle::{bootstrap, Services, Shutdown};
