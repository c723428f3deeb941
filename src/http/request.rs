//! Request identification and header access.
//!
//! # Responsibilities
//! - Generate a UUID request ID unless the client supplied one
//! - Echo the ID on the response and record it on the request span
//! - Read the gateway's own request headers
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Header values that are not visible ASCII are treated as absent

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_API_KEY: &str = "x-api-key";
pub const X_CSRF_TOKEN: &str = "x-csrf-token";

/// Random v4 UUID per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request span carrying method, path and request ID.
pub fn make_span(request: &Request<Body>) -> Span {
    let request_id = header_str(request.headers(), X_REQUEST_ID).unwrap_or("unknown");
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

/// Header value as a trimmed, non-empty string.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
