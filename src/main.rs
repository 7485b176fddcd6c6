//! Ingestion gate server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request           ┌──────────────────────────────────────────────────────┐
//!     ─────────────────────────┼─▶ http server ─▶ size guard ─▶ rate limiter ─┐       │
//!                              │                                  │           │       │
//!                              │                            counter store     ▼       │
//!     Client Response          │                          (memory | redis)  schema    │
//!     ◀────────────────────────┼── response ◀── handler ◀─────────────── validator    │
//!                              │                                                      │
//!                              │  config + hot reload · logging · metrics · lifecycle │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ingest_gate::config::{load_config, ConfigWatcher, GateConfig};
use ingest_gate::http::GateServer;
use ingest_gate::lifecycle::{build_store, drain, signals, Shutdown, StartupError};
use ingest_gate::observability::{logging, metrics};
use ingest_gate::security::SystemClock;

#[derive(Parser)]
#[command(name = "ingest-gate")]
#[command(about = "Request gate for the KPI ingestion endpoint", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path).map_err(StartupError::from)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ingest-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        ingest_path = %config.listener.ingest_path,
        max_body_bytes = config.limits.max_body_bytes,
        rate_limit_enabled = config.rate_limit.enabled,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        failure_policy = config.rate_limit.failure_policy.as_str(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let store = build_store(&config.rate_limit, Arc::new(SystemClock), &shutdown)?;

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let bind_address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            addr: bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // In-flight requests get one request timeout, plus a little slack, to finish.
    let drain_deadline = Duration::from_secs(config.timeouts.request_secs + 5);

    let server = GateServer::new(config, store.clone());
    let mut server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    let finished = tokio::select! {
        _ = signals::wait_for_shutdown_signal() => None,
        result = &mut server_task => Some(result.ok()),
    };
    shutdown.trigger();

    let result = match finished {
        Some(result) => result,
        None => drain(server_task, drain_deadline).await,
    };
    if let Some(Err(e)) = result {
        tracing::error!(error = %e, "HTTP server failed");
    }

    store.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
