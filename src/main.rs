//! Recognition gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ admission chain ──▶ handler ──▶ Recognizer
//!                     (request id,    (ip policy, lock,    │          (external
//!                      trace, limits)  rate, auth, csrf)   │           engine)
//!                                                          ▼
//!                                                     UsageLedger ──▶ flusher ──▶ snapshot
//!
//!     Cross-cutting: config (+ route hot reload), observability, lifecycle
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use recognition_gateway::config::{load_config, ConfigWatcher};
use recognition_gateway::ledger::LedgerFlusher;
use recognition_gateway::lifecycle::{persist_on_exit, signals, EXIT_PERSIST_BUDGET};
use recognition_gateway::observability::{logging, metrics};
use recognition_gateway::{bootstrap, GatewayConfig, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "recognition-gateway", version, about = "Admission-controlled recognition gateway")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "recognition-gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let services = bootstrap(&config)?;

    let shutdown = Shutdown::new();
    let flusher = LedgerFlusher::new(
        services.ledger.clone(),
        Duration::from_millis(config.ledger.poll_interval_ms),
    )
    .spawn(shutdown.subscribe());

    // The watcher handle must outlive the server.
    let (_watcher, route_updates) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), rx),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    (None, rx)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        routes = config.routes.len(),
        "Listening for connections"
    );

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        trigger.trigger();
    });

    let server = HttpServer::new(&config, services.clone());
    let served = server.run(listener, route_updates, shutdown.wait()).await;

    // Covers the case where the server stopped on its own.
    shutdown.trigger();
    if tokio::time::timeout(EXIT_PERSIST_BUDGET, flusher).await.is_err() {
        tracing::warn!("Ledger flusher did not stop in time");
    }
    persist_on_exit(services.guard.clone(), services.ledger.clone(), EXIT_PERSIST_BUDGET).await;

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
