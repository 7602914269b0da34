//! Task service (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 TASK SERVICE                  │
//!     Client Request    │  ┌─────────┐    ┌──────────┐    ┌──────────┐ │
//!     ──────────────────┼─▶│  http   │───▶│  tasks   │───▶│  store   │─┼──▶ tasks.json
//!                       │  │ server  │    │ handlers │    │repository│ │
//!                       │  └────┬────┘    └──────────┘    └──────────┘ │
//!                       │       │                                       │
//!                       │       ▼                                       │
//!                       │  ┌─────────┐                                  │
//!     Client Response   │  │  relay  │──────────────────────────────────┼──▶ third-party
//!     ◀─────────────────┼──│ handler │◀─────────────────────────────────┼─── origin
//!                       │  └─────────┘                                  │
//!                       │  config · observability · lifecycle           │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use task_relay::config::ConfigWatcher;
use task_relay::http::HttpServer;
use task_relay::lifecycle::{signals, startup, Shutdown, StartupError};
use task_relay::observability::{logging, metrics};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "task-relay")]
#[command(about = "Task CRUD service with a CORS-bypass relay", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the default task collection if the store file does not exist yet
    #[arg(long)]
    init_store: bool,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let cli = Cli::parse();

    let config = startup::load_service_config(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        store_path = %config.store.path,
        request_timeout_secs = config.timeouts.request_secs,
        relay_timeout_secs = config.relay.timeout_secs,
        "task-relay starting"
    );

    let tasks = startup::open_repository(&config.store, cli.init_store)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Task store unavailable, refusing to start"))?;

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (mpsc::unbounded_channel().1, None)
                }
            }
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let server = HttpServer::new(config.clone(), tasks)?;
    let listener = startup::bind_listener(&config).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::forward_signals(&shutdown).await;
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
