//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (resolve client address)
//!     → routing (pick the route's RoutePolicy)
//!     → chain.rs (run the policy's steps in declared order)
//!         ip_allowed    → access_control.rs (allow/deny lists)
//!         lock_check    → access_control.rs (login lockout)
//!         rate_limit    → rate_limit.rs (sliding window per identifier)
//!         authenticate  → identity.rs (signed bearer token)
//!         require_admin → identity.rs claims
//!         csrf          → csrf.rs (one-time token, unsafe methods only)
//!     → handler, with the Admission in request extensions
//! ```
//!
//! # Design Decisions
//! - Fail closed: the first failing step rejects the request
//! - Untrusted identifiers pass through keys.rs before use as map keys
//! - Each component owns its state behind a short critical section

pub mod access_control;
pub mod chain;
pub mod csrf;
pub mod headers;
pub mod identity;
pub mod keys;
pub mod rate_limit;

pub use access_control::IntrusionGuard;
pub use chain::{Admission, AdmissionChain, RequestFacts};
pub use csrf::CsrfTokenStore;
pub use identity::{Claims, IdentityTokenService, TokenError};
pub use rate_limit::{AdmissionGate, RateDecision};
