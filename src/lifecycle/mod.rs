//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → build services → load guard + ledger snapshots
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Stop accepting → broadcast to background tasks → final ledger flush
//!     → persist_on_exit (guard + ledger, bounded time budget)
//! ```
//!
//! # Design Decisions
//! - Snapshot problems at startup are logged, never fatal
//! - Exit-time saves run on a blocking thread under a deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{persist_on_exit, Shutdown, EXIT_PERSIST_BUDGET};
pub use startup::{bootstrap, Services, StartupError};
