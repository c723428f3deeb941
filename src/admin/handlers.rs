//! Admin console handlers.
//!
//! Status and guard reporting, allow/deny list and settings administration,
//! address unlocks, and usage history queries over the ledger. Guard changes
//! apply in memory first; a failed save surfaces as a 500 but the change stands.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::auth::AdminUser;
use crate::clock;
use crate::config::schema::GuardSettings;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::ledger::{Facets, Outcome, StatsReport, UsageFilter, UsageRecord};
use crate::security::access_control::{GuardStats, LockedIp, SettingsPatch};
use crate::security::rate_limit::GateStats;

const DEFAULT_RECORD_LIMIT: usize = 100;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routes: Vec<String>,
    pub ledger: LedgerStatus,
    pub rate_limiter: GateStats,
    pub active_csrf_tokens: usize,
}

#[derive(Serialize)]
pub struct LedgerStatus {
    pub records: usize,
    pub capacity: usize,
    pub unflushed: usize,
    pub persistent: bool,
}

pub async fn get_status(State(state): State<AppState>, _admin: AdminUser) -> Json<SystemStatus> {
    let services = &state.services;
    let routes = state
        .routes
        .load()
        .policies()
        .map(|p| format!("{} {}", p.name, p.path_prefix))
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        routes,
        ledger: LedgerStatus {
            records: services.ledger.len(),
            capacity: services.ledger.capacity(),
            unflushed: services.ledger.unflushed(),
            persistent: services.ledger.path().is_some(),
        },
        rate_limiter: services.gate.stats(),
        active_csrf_tokens: services.csrf.active_count(),
    })
}

#[derive(Serialize)]
pub struct SecurityStats {
    #[serde(flatten)]
    pub guard: GuardStats,
    pub locked: Vec<LockedIp>,
    pub rate_limiter: GateStats,
    pub csrf_enabled: bool,
    pub active_csrf_tokens: usize,
}

pub async fn get_security_stats(State(state): State<AppState>, _admin: AdminUser) -> Json<SecurityStats> {
    let services = &state.services;
    Json(SecurityStats {
        guard: services.guard.stats(),
        locked: services.guard.locked(),
        rate_limiter: services.gate.stats(),
        csrf_enabled: services.csrf.is_enabled(),
        active_csrf_tokens: services.csrf.active_count(),
    })
}

#[derive(Debug, Deserialize)]
pub struct IpRequest {
    pub ip: String,
}

#[derive(Serialize)]
pub struct IpList {
    pub entries: Vec<String>,
}

#[derive(Serialize)]
pub struct ListChange {
    pub ip: String,
    pub changed: bool,
}

pub async fn get_allow_list(State(state): State<AppState>, _admin: AdminUser) -> Json<IpList> {
    Json(IpList {
        entries: state.services.guard.allow_list(),
    })
}

pub async fn add_allow_list(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<IpRequest>,
) -> Result<Json<ListChange>, ApiError> {
    let changed = state.services.guard.allow(&body.ip)?;
    tracing::info!(admin = %admin.username, ip = %body.ip, changed, "Allow-list entry added");
    Ok(Json(ListChange { ip: body.ip, changed }))
}

pub async fn remove_allow_list(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<IpRequest>,
) -> Result<Json<ListChange>, ApiError> {
    let changed = state.services.guard.disallow(&body.ip)?;
    tracing::info!(admin = %admin.username, ip = %body.ip, changed, "Allow-list entry removed");
    Ok(Json(ListChange { ip: body.ip, changed }))
}

pub async fn get_deny_list(State(state): State<AppState>, _admin: AdminUser) -> Json<IpList> {
    Json(IpList {
        entries: state.services.guard.deny_list(),
    })
}

pub async fn add_deny_list(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<IpRequest>,
) -> Result<Json<ListChange>, ApiError> {
    let changed = state.services.guard.deny(&body.ip)?;
    tracing::warn!(admin = %admin.username, ip = %body.ip, changed, "Deny-list entry added");
    Ok(Json(ListChange { ip: body.ip, changed }))
}

pub async fn remove_deny_list(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<IpRequest>,
) -> Result<Json<ListChange>, ApiError> {
    let changed = state.services.guard.undeny(&body.ip)?;
    tracing::info!(admin = %admin.username, ip = %body.ip, changed, "Deny-list entry removed");
    Ok(Json(ListChange { ip: body.ip, changed }))
}

pub async fn get_settings(State(state): State<AppState>, _admin: AdminUser) -> Json<GuardSettings> {
    Json(state.services.guard.settings())
}

/// Partial settings update. CSRF changes take effect in the token store
/// even if saving the new settings failed.
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<GuardSettings>, ApiError> {
    let services = &state.services;
    let result = services.guard.update_settings(&patch);

    let current = services.guard.settings();
    services
        .csrf
        .reconfigure(current.csrf_enabled, current.csrf_lifetime_secs);

    let settings = result?;
    tracing::info!(admin = %admin.username, ?settings, "Security settings updated");
    Ok(Json(settings))
}

#[derive(Serialize)]
pub struct UnlockResult {
    pub ip: String,
    pub unlocked: bool,
}

pub async fn unlock(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<IpRequest>,
) -> Json<UnlockResult> {
    let unlocked = state.services.guard.clear_failures(&body.ip);
    tracing::info!(admin = %admin.username, ip = %body.ip, unlocked, "Manual unlock");
    Json(UnlockResult { ip: body.ip, unlocked })
}

/// Query string for history endpoints. `range_secs` is shorthand for
/// `since_ms = now - range`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub kind: Option<String>,
    pub host: Option<String>,
    pub caller_key: Option<String>,
    pub outcome: Option<Outcome>,
    pub since_ms: Option<u64>,
    pub until_ms: Option<u64>,
    pub range_secs: Option<u64>,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn filter(&self, now_ms: u64) -> UsageFilter {
        let since_ms = match self.range_secs {
            Some(range) => UsageFilter::within(range, now_ms).since_ms,
            None => self.since_ms,
        };
        UsageFilter {
            kind: self.kind.clone(),
            host: self.host.clone(),
            caller_key: self.caller_key.clone(),
            outcome: self.outcome,
            since_ms,
            until_ms: self.until_ms,
        }
    }
}

#[derive(Serialize)]
pub struct RecordsPage {
    pub count: usize,
    pub records: Vec<UsageRecord>,
}

pub async fn get_records(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<HistoryQuery>,
) -> Json<RecordsPage> {
    let ledger = &state.services.ledger;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECORD_LIMIT)
        .min(ledger.capacity());
    let records = ledger.query(&query.filter(clock::now_millis()), limit);
    Json(RecordsPage {
        count: records.len(),
        records,
    })
}

pub async fn get_history_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<HistoryQuery>,
) -> Json<StatsReport> {
    let filter = query.filter(clock::now_millis());
    let ledger = &state.services.ledger;
    let aggregates = if filter.is_empty() {
        ledger.stats(None)
    } else {
        ledger.stats(Some(&filter))
    };
    Json(aggregates.report())
}

pub async fn get_facets(State(state): State<AppState>, _admin: AdminUser) -> Json<Facets> {
    Json(state.services.ledger.facets())
}

pub async fn clear_history(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.services.ledger.clear()?;
    tracing::warn!(admin = %admin.username, "Usage history cleared");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_overrides_since() {
        let query = HistoryQuery {
            since_ms: Some(5),
            range_secs: Some(60),
            outcome: Some(Outcome::Failure),
            ..HistoryQuery::default()
        };
        let filter = query.filter(100_000);
        assert_eq!(filter.since_ms, Some(40_000));
        assert_eq!(filter.outcome, Some(Outcome::Failure));
    }

    #[test]
    fn empty_query_is_unfiltered() {
        assert!(HistoryQuery::default().filter(1_000).is_empty());
    }
}
