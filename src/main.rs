//! pollgate server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id → trace → rate limit → origin check
//!                                                        │
//!                                                        ▼
//!                     identity resolver ──▶ handlers ──▶ poll service
//!                                                        │
//!                          ┌──────────────┬──────────────┼──────────────┐
//!                          ▼              ▼              ▼              ▼
//!                     validation     authz engine   vote coordinator  audit
//!                     + sanitize     + role store   + rate tracker    recorder
//!                                         │              │              │
//!                                         └──────────────┴──────┬───────┘
//!                                                               ▼
//!                                                            storage
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use pollgate::config::{load_config, AppConfig};
use pollgate::lifecycle::{startup, Shutdown};
use pollgate::observability::{logging, metrics};
use pollgate::store::Storage;
use pollgate::HttpServer;

#[derive(Parser)]
#[command(name = "pollgate")]
#[command(about = "Polling API with access control and vote integrity", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "POLLGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("pollgate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_window_ms = config.rate_limit.window_ms,
        rate_limit_max = config.rate_limit.max_requests,
        votes_per_window = config.votes.max_votes_per_window,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let memory = startup::open_store(&config).await?;
    let granted = startup::apply_bootstrap_admins(memory.as_ref(), &config).await?;
    tracing::info!(granted, roles = ?memory.role_summary().await, "Bootstrap roles applied");

    let store: Arc<dyn Storage> = memory.clone();
    let state = startup::build_state(config, store);

    let shutdown = Arc::new(Shutdown::new());
    startup::spawn_sweepers(&state, &shutdown);

    let listener = TcpListener::bind(&state.config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    shutdown.trigger_on_signal();

    let server = HttpServer::new(state);
    server.run(listener, shutdown.subscribe()).await?;

    if let Err(e) = memory.save_snapshot().await {
        tracing::error!(error = %e, "Failed to save snapshot");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
