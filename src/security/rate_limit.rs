//! Sliding-window admission gate.
//!
//! Each identifier owns a deque of request timestamps. A call trims entries
//! older than the window, then either records the request or rejects it with
//! the time until the oldest surviving entry leaves the window.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use crate::clock::{self, ceil_secs};
use crate::observability::metrics;

const SWEEP_INTERVAL_MS: u64 = 5 * 60 * 1000;
const SWEEP_HORIZON_MS: u64 = 60 * 60 * 1000;

/// Outcome of a single [`AdmissionGate::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch second at which the window has fully drained.
    pub reset_epoch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Snapshot of gate occupancy for the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub identifiers: usize,
    pub tracked_requests: usize,
}

/// Sliding-window rate limiter keyed by opaque caller identifiers.
pub struct AdmissionGate {
    windows: DashMap<String, VecDeque<u64>>,
    last_sweep_ms: AtomicU64,
    widest_window_ms: AtomicU64,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            last_sweep_ms: AtomicU64::new(clock::now_millis()),
            widest_window_ms: AtomicU64::new(0),
        }
    }

    /// Record a request for `identifier` if fewer than `max_requests` landed
    /// in the trailing `window_secs`.
    pub fn check(&self, identifier: &str, max_requests: u32, window_secs: u64) -> RateDecision {
        self.check_at(identifier, max_requests, window_secs, clock::now_millis())
    }

    pub fn check_at(
        &self,
        identifier: &str,
        max_requests: u32,
        window_secs: u64,
        now_ms: u64,
    ) -> RateDecision {
        let window_ms = window_secs.saturating_mul(1000);
        self.widest_window_ms.fetch_max(window_ms, Ordering::Relaxed);

        // Must run before the entry guard below is taken: retain() locks every shard.
        self.maybe_sweep(now_ms);

        let cutoff = now_ms.saturating_sub(window_ms);
        let mut entry = self.windows.entry(identifier.to_owned()).or_default();
        let stamps = entry.value_mut();
        while stamps.front().is_some_and(|&ts| ts < cutoff) {
            stamps.pop_front();
        }

        let used = u32::try_from(stamps.len()).unwrap_or(u32::MAX);
        if used >= max_requests {
            let oldest = stamps.front().copied().unwrap_or(now_ms);
            let frees_at = oldest.saturating_add(window_ms);
            let retry = ceil_secs(frees_at.saturating_sub(now_ms)).max(1);
            return RateDecision {
                allowed: false,
                limit: max_requests,
                remaining: 0,
                reset_epoch: ceil_secs(frees_at),
                retry_after_secs: Some(retry),
            };
        }

        stamps.push_back(now_ms);
        let oldest = stamps.front().copied().unwrap_or(now_ms);
        RateDecision {
            allowed: true,
            limit: max_requests,
            remaining: max_requests - used - 1,
            reset_epoch: ceil_secs(oldest.saturating_add(window_ms)),
            retry_after_secs: None,
        }
    }

    fn maybe_sweep(&self, now_ms: u64) {
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < SWEEP_INTERVAL_MS {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep_at(now_ms);
        }
    }

    /// Drop timestamps past the sweep horizon and forget idle identifiers.
    ///
    /// The horizon never shrinks below the widest window seen, so sweeping
    /// cannot change a later decision.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let horizon = SWEEP_HORIZON_MS.max(self.widest_window_ms.load(Ordering::Relaxed));
        let cutoff = now_ms.saturating_sub(horizon);
        let before = self.windows.len();
        self.windows.retain(|_, stamps| {
            while stamps.front().is_some_and(|&ts| ts < cutoff) {
                stamps.pop_front();
            }
            !stamps.is_empty()
        });
        let after = self.windows.len();
        metrics::set_rate_limit_identifiers(after);
        if before > after {
            tracing::debug!(removed = before - after, remaining = after, "Swept idle rate-limit windows");
        }
        before - after
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            identifiers: self.windows.len(),
            tracked_requests: self.windows.iter().map(|e| e.value().len()).sum(),
        }
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}
