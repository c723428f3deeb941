//! Shared utilities for integration tests.
//!
//! Each test gets its own gateway: services bootstrapped against a temporary
//! directory, a stub recognition engine and the full router, driven
//! in-process with `oneshot`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use recognition_gateway::config::schema::{AccountConfig, GatewayConfig};
use recognition_gateway::directory::hash_password_with;
use recognition_gateway::engine::{EngineError, Recognition, RecognitionRequest, Recognizer};
use recognition_gateway::{bootstrap, HttpServer, Services};

pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const CALLER_KEY: &str = "ck_live_alpha";
pub const OTHER_CALLER_KEY: &str = "ck_live_beta";
pub const CLIENT_IP: &str = "198.51.100.7";

/// Engine double that echoes the job kind or fails on demand.
#[derive(Default)]
pub struct StubRecognizer {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Recognizer for StubRecognizer {
    fn model(&self) -> &str {
        "stub-v1"
    }

    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::Status(500));
        }
        Ok(Recognition {
            data: json!({ "kind": request.kind, "x": 42 }),
        })
    }
}

/// Minimum-cost Argon2id so logins stay fast in tests.
fn password_hash() -> String {
    let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    hash_password_with(&argon2, ADMIN_PASSWORD).unwrap()
}

fn account(user_id: i64, username: &str, is_admin: bool, active: bool) -> AccountConfig {
    AccountConfig {
        user_id,
        username: username.into(),
        password_hash: password_hash(),
        is_admin,
        active,
    }
}

/// Defaults with all state under `dir`.
pub fn base_config(dir: &std::path::Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.security.state_path = Some(dir.join("security_config.json"));
    config.ledger.snapshot_path = Some(dir.join("usage_history.json"));
    config.auth.secret_env = "RECOGNITION_GATEWAY_TEST_SECRET_UNSET".into();
    config.directory.accounts = vec![
        account(1, "admin", true, true),
        account(2, "viewer", false, true),
        account(3, "retired", true, false),
    ];
    config.directory.caller_keys = vec![CALLER_KEY.into(), OTHER_CALLER_KEY.into()];
    config
}

pub struct TestGateway {
    pub dir: TempDir,
    pub config: GatewayConfig,
    pub services: Services,
    pub engine: Arc<StubRecognizer>,
    pub app: Router,
}

pub struct Session {
    pub token: String,
    pub csrf: Option<String>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut GatewayConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        configure(&mut config);
        Self::start(dir, config)
    }

    pub fn start(dir: TempDir, config: GatewayConfig) -> Self {
        let mut services = bootstrap(&config).unwrap();
        let engine = Arc::new(StubRecognizer::default());
        let recognizer: Arc<dyn Recognizer> = engine.clone();
        services.engine = recognizer;
        let app = HttpServer::new(&config, services.clone()).into_router();
        Self {
            dir,
            config,
            services,
            engine,
            app,
        }
    }

    /// Fresh services over the same state directory, as after a restart.
    pub fn restart(self) -> Self {
        Self::start(self.dir, self.config)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.send_from(CLIENT_IP, request).await
    }

    pub async fn send_from(&self, ip: &str, mut request: Request<Body>) -> Response {
        let peer = SocketAddr::new(ip.parse().unwrap(), 40_000);
        request.extensions_mut().insert(ConnectInfo(peer));
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn login(&self, username: &str) -> Session {
        let response = self
            .send(json_request(
                Method::POST,
                "/admin/login",
                json!({ "username": username, "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), 200, "login as {username} failed");
        let body = body_json(response).await;
        Session {
            token: body["token"].as_str().unwrap().to_owned(),
            csrf: body["csrf_token"].as_str().map(str::to_owned),
        }
    }

    /// Fresh one-time CSRF token for `session`.
    pub async fn csrf(&self, session: &Session) -> String {
        let response = self
            .send(authorized(empty_request(Method::GET, "/admin/csrf"), &session.token))
            .await;
        assert_eq!(response.status(), 200);
        body_json(response).await["csrf_token"].as_str().unwrap().to_owned()
    }
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn with_header(mut request: Request<Body>, name: &'static str, value: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(name, HeaderValue::from_str(value).unwrap());
    request
}

pub fn authorized(request: Request<Body>, token: &str) -> Request<Body> {
    with_header(request, "authorization", &format!("Bearer {token}"))
}

pub fn recognize_request(caller_key: &str, kind: &str) -> Request<Body> {
    with_header(
        json_request(
            Method::POST,
            "/recognize",
            json!({ "kind": kind, "host": "shop.example", "payload": { "image": "aGVsbG8=" } }),
        ),
        "x-api-key",
        caller_key,
    )
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
