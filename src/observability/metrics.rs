//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_admission_denied_total` (counter): rejections by chain step
//! - `gateway_rate_limited_total` (counter): rate-limit rejections by route
//! - `gateway_lockouts_total` (counter): addresses locked after failed logins
//! - `gateway_login_attempts_total` (counter): console logins by outcome
//! - `gateway_usage_records_total` (counter): ledger records by outcome
//! - `gateway_ledger_flushes_total` (counter): snapshot writes by outcome
//! - `gateway_ledger_buffered_records` (gauge): records held in memory
//! - `gateway_rate_limit_identifiers` (gauge): tracked rate-limit windows
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_admission_denied(step: &'static str) {
    counter!("gateway_admission_denied_total", "step" => step).increment(1);
}

pub fn record_rate_limited(route: &str) {
    counter!("gateway_rate_limited_total", "route" => route.to_owned()).increment(1);
}

pub fn record_lockout() {
    counter!("gateway_lockouts_total").increment(1);
}

pub fn record_login_attempt(outcome: &'static str) {
    counter!("gateway_login_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_usage(outcome: &'static str) {
    counter!("gateway_usage_records_total", "outcome" => outcome).increment(1);
}

pub fn record_ledger_flush(outcome: &'static str) {
    counter!("gateway_ledger_flushes_total", "outcome" => outcome).increment(1);
}

pub fn set_ledger_buffered(records: usize) {
    gauge!("gateway_ledger_buffered_records").set(records as f64);
}

pub fn set_rate_limit_identifiers(count: usize) {
    gauge!("gateway_rate_limit_identifiers").set(count as f64);
}
