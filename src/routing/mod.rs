//! Route policy resolution.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (RouteTable: longest matching prefix)
//!     → matcher.rs (segment-aware prefix test)
//!     → RoutePolicy (ordered admission steps for the request)
//! ```

pub mod matcher;
pub mod router;

pub use router::RouteTable;
