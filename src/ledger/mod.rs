//! Usage ledger subsystem.
//!
//! # Data Flow
//! ```text
//! Request handler
//!     → store.rs add() (append to bounded buffer, bump aggregates)
//!     → flusher.rs (background task: poll tick or full batch)
//!     → persist.rs (atomic JSON snapshot)
//!
//! Admin console
//!     → store.rs query() / stats() / facets() / clear()
//! ```
//!
//! # Design Decisions
//! - Request paths never touch the disk
//! - Full snapshot per flush; the buffer is bounded so this stays cheap
//! - Aggregates survive buffer eviction and are only reset by clear()

pub mod aggregate;
pub mod filter;
pub mod flusher;
pub mod record;
pub mod store;

pub use aggregate::{Aggregates, Counters, StatsReport};
pub use filter::UsageFilter;
pub use flusher::LedgerFlusher;
pub use record::{Outcome, UsageEvent, UsageRecord};
pub use store::{Facets, LedgerSnapshot, UsageLedger};
