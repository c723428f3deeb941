//! Background write-behind task for the usage ledger.
//!
//! One task owns all scheduled writes. It wakes on a poll tick or when the
//! ledger reports a full batch, and performs a final flush on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock;
use crate::ledger::store::UsageLedger;

pub struct LedgerFlusher {
    ledger: Arc<UsageLedger>,
    poll_interval: Duration,
}

impl LedgerFlusher {
    pub fn new(ledger: Arc<UsageLedger>, poll_interval: Duration) -> Self {
        Self {
            ledger,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(poll_ms = self.poll_interval.as_millis() as u64, "Usage ledger flusher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.ledger.is_flush_due_at(clock::now_millis()) {
                        flush_blocking(&self.ledger).await;
                    }
                }
                _ = self.ledger.batch_ready() => {
                    flush_blocking(&self.ledger).await;
                }
                _ = shutdown.recv() => {
                    flush_blocking(&self.ledger).await;
                    break;
                }
            }
        }

        tracing::info!("Usage ledger flusher stopped");
    }
}

/// Run one flush on the blocking pool. Failures are logged and retried on a later tick.
pub async fn flush_blocking(ledger: &Arc<UsageLedger>) {
    let ledger = Arc::clone(ledger);
    match tokio::task::spawn_blocking(move || ledger.flush()).await {
        // The ledger logs its own outcome.
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Usage flush task panicked"),
    }
}
