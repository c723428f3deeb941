//! Gateway handlers: recognition, console login/logout, CSRF and health.

use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::directory::Account;
use crate::engine::RecognitionRequest;
use crate::error::Rejection;
use crate::http::request::{header_str, X_API_KEY};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::ledger::{Outcome, UsageEvent};
use crate::observability::metrics;
use crate::security::access_control::FailureOutcome;
use crate::security::keys::sanitize_key;
use crate::security::Admission;

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub success: bool,
    pub model: String,
    pub duration_ms: u64,
    pub data: serde_json::Value,
}

pub async fn recognize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(job): Json<RecognitionRequest>,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let services = &state.services;
    let caller_key = header_str(&headers, X_API_KEY)
        .and_then(sanitize_key)
        .filter(|key| services.directory.is_known_caller(key))
        .ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "invalid_api_key", "missing or unknown API key")
        })?
        .to_owned();

    if job.kind.trim().is_empty() {
        return Err(ApiError::bad_request("kind must not be empty"));
    }

    let model = services.engine.model().to_owned();
    let started = Instant::now();
    let result = services.engine.recognize(&job).await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    services.ledger.add(UsageEvent {
        kind: job.kind,
        host: job.host,
        model: model.clone(),
        caller_key,
        outcome: if result.is_ok() { Outcome::Success } else { Outcome::Failure },
        duration_ms,
    });

    match result {
        Ok(recognition) => Ok(Json(RecognizeResponse {
            success: true,
            model,
            duration_ms,
            data: recognition.data,
        })),
        Err(e) => {
            tracing::warn!(error = %e, duration_ms, "Recognition failed");
            Err(ApiError::new(StatusCode::BAD_GATEWAY, "engine_error", e.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub csrf_token: Option<String>,
    pub expires_in: u64,
    pub user: Account,
}

/// Console login. Failures count towards the caller address lockout.
pub async fn login(
    State(state): State<AppState>,
    Extension(admission): Extension<Admission>,
    Json(credentials): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let services = &state.services;
    let ip = admission.client_ip.as_str();

    let directory = services.directory.clone();
    let LoginRequest { username, password } = credentials;
    // Argon2 verification is CPU bound; keep it off the async workers.
    let account = tokio::task::spawn_blocking(move || directory.authenticate(&username, &password))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password check task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        })?;

    match account {
        Some(account) if !account.active => {
            metrics::record_login_attempt("disabled");
            tracing::warn!(ip, username = %account.username, "Login to disabled account");
            Err(ApiError::new(StatusCode::FORBIDDEN, "account_disabled", "account is disabled"))
        }
        Some(account) => {
            services.guard.clear_failures(ip);
            let token = services
                .tokens
                .generate(account.user_id, &account.username, account.is_admin);
            metrics::record_login_attempt("success");
            tracing::info!(ip, username = %account.username, "Console login");
            Ok(Json(LoginResponse {
                token,
                csrf_token: services.csrf.issue(),
                expires_in: services.tokens.ttl_secs(),
                user: account,
            }))
        }
        None => {
            metrics::record_login_attempt("failure");
            match services.guard.record_failure(ip) {
                FailureOutcome::Locked { lockout_secs } => Err(Rejection::Locked {
                    remaining_secs: lockout_secs,
                }
                .into()),
                FailureOutcome::Counted {
                    remaining_attempts, ..
                } => Err(ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "invalid_credentials",
                    "invalid username or password",
                )
                .with_remaining_attempts(remaining_attempts)),
            }
        }
    }
}

/// Tokens are stateless; logout only tells the client to discard them.
pub async fn logout(Extension(admission): Extension<Admission>) -> Json<serde_json::Value> {
    if let Some(principal) = &admission.principal {
        tracing::info!(username = %principal.username, ip = %admission.client_ip, "Console logout");
    }
    Json(serde_json::json!({ "success": true }))
}

#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    pub enabled: bool,
    pub csrf_token: Option<String>,
}

pub async fn csrf_token(State(state): State<AppState>) -> Json<CsrfResponse> {
    let csrf = &state.services.csrf;
    Json(CsrfResponse {
        enabled: csrf.is_enabled(),
        csrf_token: csrf.issue(),
    })
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
