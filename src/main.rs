//! presigner -- issues SigV4 presigned upload URLs.
//!
//! Configuration is read once at startup (YAML file plus environment) and
//! shared read-only with every request. SIGTERM/SIGINT stop accepting
//! connections and let in-flight requests finish; there is no state to save.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the presigner server.
#[derive(Parser, Debug)]
#[command(
    name = "presigner",
    version,
    about = "Presigned upload URL gateway for S3-compatible storage"
)]
struct Cli {
    /// Path to a YAML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = presigner::config::load_config(cli.config.as_deref())?;

    init_tracing(&config.logging);

    match &cli.config {
        Some(path) => info!("Loaded configuration from {} and environment", path),
        None => info!("Loaded configuration from environment"),
    }

    // Requests fail with a 500 until this is fixed; the process still starts
    // so health probes and metrics stay reachable.
    if let Err(err) = config.storage.upload_target() {
        warn!("Storage configuration incomplete: {}", err);
    } else {
        info!(
            "Signing uploads for bucket={} endpoint={} region={} expiry={}s",
            config.storage.bucket,
            config.storage.endpoint,
            config.storage.region,
            config.storage.expiry_seconds
        );
    }

    if config.observability.metrics {
        presigner::metrics::init_metrics()?;
        presigner::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    let state = Arc::new(presigner::AppState { config });
    let app = presigner::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("presigner listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("presigner shut down");

    Ok(())
}

/// Initialize tracing. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &presigner::config::LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
