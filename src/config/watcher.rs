//! Configuration file watcher for hot reload of route policies.
//!
//! Only the `routes` section is applied live; changes to other sections are
//! picked up on restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RoutePolicy;

/// Watches the configuration file and publishes validated route tables.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Vec<RoutePolicy>>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for route updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Vec<RoutePolicy>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = %path.display(), "Config file changed, reloading routes");
                    match load_config(&path) {
                        Ok(config) => {
                            let count = config.routes.len();
                            if tx.send(config.routes).is_ok() {
                                tracing::debug!(routes = count, "Route update published");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Rejected config change, keeping current routes");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}
