//! Error types shared across subsystems.

use std::path::PathBuf;

use thiserror::Error;

use crate::security::rate_limit::RateDecision;

/// Failure reading or writing a JSON snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Why a request was refused before reaching its handler.
///
/// `RateLimited` and `Locked` are soft and carry a retry hint. The token
/// variants ask the caller to log in again; `Forbidden` needs an operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("rate limit exceeded, retry in {}s", .0.retry_after_secs.unwrap_or(1))]
    RateLimited(RateDecision),

    #[error("too many failed attempts, locked for another {remaining_secs}s")]
    Locked { remaining_secs: u64 },

    #[error("access denied: {reason}")]
    Forbidden { reason: String },

    #[error("missing or invalid authentication token")]
    InvalidToken,

    #[error("authentication token expired")]
    ExpiredToken,

    #[error("administrator role required")]
    InsufficientRole,

    #[error("missing or invalid CSRF token")]
    CsrfRejected,

    #[error("internal persistence failure: {0}")]
    PersistenceFailure(String),
}

impl Rejection {
    /// Stable machine-readable code, used in response bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::RateLimited(_) => "rate_limited",
            Rejection::Locked { .. } => "locked",
            Rejection::Forbidden { .. } => "forbidden",
            Rejection::InvalidToken => "invalid_token",
            Rejection::ExpiredToken => "expired_token",
            Rejection::InsufficientRole => "insufficient_role",
            Rejection::CsrfRejected => "csrf_rejected",
            Rejection::PersistenceFailure(_) => "persistence_failure",
        }
    }

    /// Seconds the caller should wait before retrying, if the rejection is soft.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Rejection::RateLimited(decision) => Some(decision.retry_after_secs.unwrap_or(1)),
            Rejection::Locked { remaining_secs } => Some((*remaining_secs).max(1)),
            _ => None,
        }
    }
}

impl From<PersistError> for Rejection {
    fn from(err: PersistError) -> Self {
        Rejection::PersistenceFailure(err.to_string())
    }
}
