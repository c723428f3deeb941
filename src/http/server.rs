//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with gateway and admin handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, admission)
//! - Apply hot-reloaded route policies
//! - Bind server to listener with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::schema::{GatewayConfig, RoutePolicy};
use crate::config::validation::validate_routes;
use crate::http::handlers;
use crate::http::middleware::admission_middleware;
use crate::http::request::{make_span, UuidRequestId};
use crate::lifecycle::Services;
use crate::routing::RouteTable;
use crate::security::AdmissionChain;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub chain: AdmissionChain,
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub trust_forwarded: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &GatewayConfig, services: Services) -> Self {
        Self {
            chain: services.chain(),
            services,
            routes: Arc::new(ArcSwap::from_pointee(RouteTable::new(config.routes.clone()))),
            trust_forwarded: config.security.trust_forwarded_headers,
            started_at: Instant::now(),
        }
    }

    /// Swap in a new route table if the policies are valid.
    pub fn apply_routes(&self, policies: Vec<RoutePolicy>) -> bool {
        let errors = validate_routes(&policies);
        if !errors.is_empty() {
            for error in &errors {
                tracing::error!(%error, "Rejected route update");
            }
            return false;
        }
        let count = policies.len();
        self.routes.store(Arc::new(RouteTable::new(policies)));
        tracing::info!(routes = count, "Route policies reloaded");
        true
    }
}

/// HTTP server for the recognition gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &GatewayConfig, services: Services) -> Self {
        let state = AppState::new(config, services);
        let router = build_router(config, state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Consume the server, returning the router for in-process use.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run(
        self,
        listener: TcpListener,
        mut route_updates: mpsc::UnboundedReceiver<Vec<RoutePolicy>>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let reloader = tokio::spawn(async move {
            while let Some(policies) = route_updates.recv().await {
                state.apply_routes(policies);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/recognize", post(handlers::recognize))
        .route("/admin/login", post(handlers::login))
        .route("/admin/logout", post(handlers::logout))
        .route("/admin/csrf", get(handlers::csrf_token))
        .merge(setup_admin_router())
        .layer(middleware::from_fn_with_state(state.clone(), admission_middleware))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
                // Innermost: the timeout's empty 408 body needs `Body: Default`.
                .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs))),
        )
}
