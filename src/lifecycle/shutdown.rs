//! Shutdown coordination and exit-time persistence.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::ledger::UsageLedger;
use crate::security::IntrusionGuard;

/// Time allowed for the final saves before the process exits anyway.
pub const EXIT_PERSIST_BUDGET: Duration = Duration::from_secs(5);

/// Coordinator for graceful shutdown.
///
/// Cloneable handle over a broadcast channel that long-running tasks
/// subscribe to. Triggering is idempotent.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::AcqRel) {
            tracing::info!(subscribers = self.tx.receiver_count(), "Shutdown triggered");
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Future that resolves once shutdown is triggered, even if that already happened.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        let already = self.is_triggered();
        async move {
            if !already {
                let _ = rx.recv().await;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Flush the ledger and save the guard on a blocking thread within `budget`.
///
/// Failures and timeouts are logged; they never abort the exit.
pub async fn persist_on_exit(guard: Arc<IntrusionGuard>, ledger: Arc<UsageLedger>, budget: Duration) {
    let task = tokio::task::spawn_blocking(move || (ledger.flush(), guard.save()));

    match tokio::time::timeout(budget, task).await {
        Ok(Ok((ledger_result, guard_result))) => {
            match ledger_result {
                Ok(records) => tracing::info!(records, "Usage history saved"),
                Err(e) => tracing::error!(error = %e, "Usage history not saved on exit"),
            }
            match guard_result {
                Ok(()) => tracing::info!("Security policy saved"),
                Err(e) => tracing::error!(error = %e, "Security policy not saved on exit"),
            }
        }
        Ok(Err(e)) => tracing::error!(error = %e, "Exit persistence task failed"),
        Err(_) => tracing::error!(budget_secs = budget.as_secs(), "Exit persistence exceeded its time budget"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{GuardSettings, LedgerConfig};
    use crate::ledger::{LedgerSnapshot, Outcome, UsageEvent};
    use crate::persist;
    use crate::security::access_control::GuardSnapshot;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.wait();
        shutdown.trigger();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap();

        // Late subscribers do not hang.
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait()).await.unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn exit_persistence_writes_both_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let guard_path = dir.path().join("security.json");
        let ledger_path = dir.path().join("history.json");

        let guard = Arc::new(IntrusionGuard::new(GuardSettings::default(), Some(guard_path.clone())));
        let ledger = Arc::new(UsageLedger::new(&LedgerConfig {
            snapshot_path: Some(ledger_path.clone()),
            ..LedgerConfig::default()
        }));
        ledger.add(UsageEvent {
            kind: "click".into(),
            host: "h".into(),
            model: "m".into(),
            caller_key: "k".into(),
            outcome: Outcome::Failure,
            duration_ms: 9,
        });

        persist_on_exit(guard, ledger, EXIT_PERSIST_BUDGET).await;

        let history: LedgerSnapshot = persist::read_snapshot(&ledger_path).unwrap().unwrap();
        assert_eq!(history.records.len(), 1);
        let security: GuardSnapshot = persist::read_snapshot(&guard_path).unwrap().unwrap();
        assert!(security.config.enable_deny_list);
    }
}
