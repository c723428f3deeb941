//! Response shaping for rejections and handler errors.
//!
//! # Design Decisions
//! - Every error body is JSON `{code, message, retry_after?}`
//! - Soft rejections carry `Retry-After`; rate decisions always echo
//!   `X-RateLimit-*` headers

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{PersistError, Rejection};
use crate::security::access_control::GuardError;
use crate::security::RateDecision;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
}

pub fn apply_rate_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_epoch));
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::RateLimited(_) | Rejection::Locked { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::Forbidden { .. } | Rejection::InsufficientRole | Rejection::CsrfRejected => {
                StatusCode::FORBIDDEN
            }
            Rejection::InvalidToken | Rejection::ExpiredToken => StatusCode::UNAUTHORIZED,
            Rejection::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after_secs();
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            retry_after,
            remaining_attempts: None,
        };

        let mut response = (self.status(), Json(body)).into_response();
        let headers = response.headers_mut();
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if let Rejection::RateLimited(decision) = &self {
            apply_rate_headers(headers, decision);
        }
        if matches!(self, Rejection::InvalidToken | Rejection::ExpiredToken) {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Error returned by gateway and admin handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                retry_after: None,
                remaining_attempts: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn with_remaining_attempts(mut self, remaining: u32) -> Self {
        self.body.remaining_attempts = Some(remaining);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.body.retry_after;
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        Self {
            status: rejection.status(),
            body: ErrorBody {
                code: rejection.code(),
                message: rejection.to_string(),
                retry_after: rejection.retry_after_secs(),
                remaining_attempts: None,
            },
        }
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        tracing::error!(error = %err, "Persistence failure while serving request");
        Rejection::from(err).into()
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::InvalidIp(_) | GuardError::InvalidSetting { .. } => Self::bad_request(err.to_string()),
            GuardError::Persist(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision() -> RateDecision {
        RateDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_epoch: 1_700_000_060,
            retry_after_secs: Some(59),
        }
    }

    #[test]
    fn rate_limited_maps_to_429_with_headers() {
        let response = Rejection::RateLimited(decision()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers[header::RETRY_AFTER], "59");
        assert_eq!(headers[X_RATELIMIT_LIMIT], "5");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
        assert_eq!(headers[X_RATELIMIT_RESET], "1700000060");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(Rejection::Locked { remaining_secs: 10 }.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            Rejection::Forbidden { reason: "deny_listed".into() }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(Rejection::InsufficientRole.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::CsrfRejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Rejection::ExpiredToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Rejection::PersistenceFailure("disk".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_ip_is_a_bad_request() {
        let err: ApiError = GuardError::InvalidIp("nope".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
