//! Admin console JSON API.
//!
//! Every route sits under `/admin` and is guarded by that prefix's chain;
//! handlers additionally take an [`auth::AdminUser`].

pub mod auth;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;
use self::handlers::*;

pub fn setup_admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/security/stats", get(get_security_stats))
        .route(
            "/admin/security/allow-list",
            get(get_allow_list).post(add_allow_list).delete(remove_allow_list),
        )
        .route(
            "/admin/security/deny-list",
            get(get_deny_list).post(add_deny_list).delete(remove_deny_list),
        )
        .route("/admin/security/settings", get(get_settings).put(update_settings))
        .route("/admin/security/unlock", post(unlock))
        .route("/admin/history/records", get(get_records))
        .route("/admin/history/stats", get(get_history_stats))
        .route("/admin/history/facets", get(get_facets))
        .route("/admin/history/clear", post(clear_history))
}
