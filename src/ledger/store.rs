//! Bounded usage ledger with write-behind snapshots.
//!
//! Request paths only append in memory. A single background flusher (see
//! `flusher.rs`) writes full snapshots when enough records are pending or the
//! flush interval has passed; `clear` writes one synchronously.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::clock;
use crate::config::schema::LedgerConfig;
use crate::error::PersistError;
use crate::ledger::aggregate::Aggregates;
use crate::ledger::filter::UsageFilter;
use crate::ledger::record::{UsageEvent, UsageRecord};
use crate::observability::metrics;
use crate::persist;

/// On-disk document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSnapshot {
    pub records: Vec<UsageRecord>,
    pub aggregates: Aggregates,
    pub saved_at_ms: u64,
}

/// Distinct values present in the buffer, for filter pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub kinds: Vec<String>,
    pub hosts: Vec<String>,
    pub models: Vec<String>,
    pub caller_keys: Vec<String>,
}

#[derive(Debug, Default)]
struct LedgerState {
    records: VecDeque<UsageRecord>,
    aggregates: Aggregates,
    unflushed: usize,
    last_flush_ms: u64,
}

pub struct UsageLedger {
    state: Mutex<LedgerState>,
    capacity: usize,
    batch_size: usize,
    flush_interval_ms: u64,
    path: Option<PathBuf>,
    persist_lock: Mutex<()>,
    flush_due: Notify,
}

impl UsageLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            state: Mutex::new(LedgerState {
                records: VecDeque::with_capacity(capacity.min(16_384)),
                last_flush_ms: clock::now_millis(),
                ..LedgerState::default()
            }),
            capacity,
            batch_size: config.batch_size.max(1),
            flush_interval_ms: config.flush_interval_secs.saturating_mul(1000),
            path: config.snapshot_path.clone(),
            persist_lock: Mutex::new(()),
            flush_due: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace in-memory state with the last snapshot, if readable.
    ///
    /// Returns the number of records restored. Missing or corrupt snapshots
    /// leave the ledger empty.
    pub fn load(&self) -> usize {
        let Some(path) = self.path.as_deref() else {
            return 0;
        };
        let snapshot = match persist::read_snapshot::<LedgerSnapshot>(path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::info!(path = %path.display(), "No usage snapshot, starting empty");
                return 0;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load usage snapshot, starting empty");
                return 0;
            }
        };

        let mut records: VecDeque<UsageRecord> = snapshot.records.into();
        while records.len() > self.capacity {
            records.pop_front();
        }
        let restored = records.len();

        let mut state = self.state();
        state.records = records;
        state.aggregates = snapshot.aggregates;
        state.unflushed = 0;
        drop(state);

        metrics::set_ledger_buffered(restored);
        tracing::info!(path = %path.display(), records = restored, "Loaded usage history");
        restored
    }

    pub fn add(&self, event: UsageEvent) {
        self.add_at(event, clock::now_millis());
    }

    pub fn add_at(&self, event: UsageEvent, now_ms: u64) {
        let outcome = event.outcome;
        let (buffered, batch_ready) = {
            let mut state = self.state();
            if state.records.len() >= self.capacity {
                state.records.pop_front();
            }
            state.aggregates.record(&event);
            state.records.push_back(UsageRecord {
                timestamp_ms: now_ms,
                event,
            });
            state.unflushed += 1;
            (state.records.len(), state.unflushed == self.batch_size)
        };

        metrics::record_usage(outcome.as_str());
        metrics::set_ledger_buffered(buffered);
        if batch_ready {
            self.flush_due.notify_one();
        }
    }

    /// Matching records, most recent first, at most `limit` of them.
    pub fn query(&self, filter: &UsageFilter, limit: usize) -> Vec<UsageRecord> {
        self.state()
            .records
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Running totals, or totals recomputed over the matching buffered records.
    pub fn stats(&self, filter: Option<&UsageFilter>) -> Aggregates {
        let state = self.state();
        match filter.filter(|f| !f.is_empty()) {
            None => state.aggregates.clone(),
            Some(filter) => Aggregates::from_records(state.records.iter().filter(|r| filter.matches(r))),
        }
    }

    /// Totals over the trailing `range_secs`.
    pub fn stats_window(&self, range_secs: u64) -> Aggregates {
        self.stats(Some(&UsageFilter::within(range_secs, clock::now_millis())))
    }

    pub fn facets(&self) -> Facets {
        let state = self.state();
        let mut kinds = BTreeSet::new();
        let mut hosts = BTreeSet::new();
        let mut models = BTreeSet::new();
        let mut caller_keys = BTreeSet::new();
        for record in &state.records {
            let e = &record.event;
            kinds.insert(e.kind.as_str());
            hosts.insert(e.host.as_str());
            models.insert(e.model.as_str());
            caller_keys.insert(e.caller_key.as_str());
        }
        let owned = |set: BTreeSet<&str>| -> Vec<String> { set.into_iter().map(str::to_owned).collect() };
        Facets {
            kinds: owned(kinds),
            hosts: owned(hosts),
            models: owned(models),
            caller_keys: owned(caller_keys),
        }
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records added since the last successful snapshot.
    pub fn unflushed(&self) -> usize {
        self.state().unflushed
    }

    pub fn is_flush_due_at(&self, now_ms: u64) -> bool {
        let state = self.state();
        state.unflushed >= self.batch_size
            || (state.unflushed > 0
                && now_ms.saturating_sub(state.last_flush_ms) >= self.flush_interval_ms)
    }

    /// Completes once a full batch is pending.
    pub async fn batch_ready(&self) {
        self.flush_due.notified().await
    }

    /// Write a snapshot if anything is pending. Returns the records covered.
    ///
    /// Blocking; call from a blocking thread.
    pub fn flush(&self) -> Result<usize, PersistError> {
        let _writer = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now_ms = clock::now_millis();

        let Some(path) = self.path.as_deref() else {
            let mut state = self.state();
            let pending = std::mem::take(&mut state.unflushed);
            state.last_flush_ms = now_ms;
            return Ok(pending);
        };

        let (snapshot, pending) = {
            let state = self.state();
            if state.unflushed == 0 {
                return Ok(0);
            }
            (Self::snapshot_of(&state, now_ms), state.unflushed)
        };

        match persist::write_snapshot(path, &snapshot) {
            Ok(()) => {
                let mut state = self.state();
                state.unflushed = state.unflushed.saturating_sub(pending);
                state.last_flush_ms = now_ms;
                drop(state);
                metrics::record_ledger_flush("success");
                tracing::debug!(records = snapshot.records.len(), pending, "Usage history flushed");
                Ok(pending)
            }
            Err(e) => {
                metrics::record_ledger_flush("failure");
                tracing::error!(path = %path.display(), error = %e, "Failed to flush usage history");
                Err(e)
            }
        }
    }

    /// Empty the buffer and counters, then persist the empty state.
    ///
    /// The in-memory clear stands even if the write fails.
    pub fn clear(&self) -> Result<(), PersistError> {
        let _writer = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now_ms = clock::now_millis();
        let snapshot = {
            let mut state = self.state();
            state.records.clear();
            state.aggregates = Aggregates::default();
            state.unflushed = 0;
            state.last_flush_ms = now_ms;
            Self::snapshot_of(&state, now_ms)
        };
        metrics::set_ledger_buffered(0);
        tracing::info!("Usage history cleared");

        match self.path.as_deref() {
            Some(path) => persist::write_snapshot(path, &snapshot).inspect_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "Failed to persist cleared usage history");
            }),
            None => Ok(()),
        }
    }

    fn snapshot_of(state: &LedgerState, now_ms: u64) -> LedgerSnapshot {
        LedgerSnapshot {
            records: state.records.iter().cloned().collect(),
            aggregates: state.aggregates.clone(),
            saved_at_ms: now_ms,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
