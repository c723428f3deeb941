//! Admission middleware.
//! Runs the matched route's guard chain before any handler.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::Rejection;
use crate::http::request::{header_str, X_API_KEY, X_CSRF_TOKEN};
use crate::http::response::apply_rate_headers;
use crate::http::server::AppState;
use crate::security::headers::client_ip;
use crate::security::{Admission, RequestFacts};

pub async fn admission_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, state.trust_forwarded);

    let outcome = {
        let routes = state.routes.load();
        match routes.resolve(request.uri().path()) {
            Some(policy) => {
                let headers = request.headers();
                let facts = RequestFacts {
                    ip: &ip,
                    method: request.method(),
                    caller_key: header_str(headers, X_API_KEY),
                    authorization: header_str(headers, AUTHORIZATION.as_str()),
                    csrf_token: header_str(headers, X_CSRF_TOKEN),
                };
                state.chain.evaluate(policy, &facts)
            }
            None => Ok(Admission {
                client_ip: ip.clone(),
                ..Admission::default()
            }),
        }
    };

    match outcome {
        Ok(admission) => {
            let rate = admission.rate.clone();
            request.extensions_mut().insert(admission);
            let mut response = next.run(request).await;
            if let Some(rate) = rate {
                apply_rate_headers(response.headers_mut(), &rate);
            }
            response
        }
        Err(rejection) => {
            if matches!(rejection, Rejection::Forbidden { .. }) {
                tracing::warn!(ip = %ip, path = %request.uri().path(), reason = %rejection, "Request denied by IP policy");
            }
            rejection.into_response()
        }
    }
}
