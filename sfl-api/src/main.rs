//! sfl-api - read-only HTTP API over the sentiment impressions store

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sfl_api::{build_router, AppState};
use sfl_common::config::{LoggingConfig, TomlConfig};
use sfl_common::db::connect_readonly;
use sfl_common::store::SqliteStore;
use sfl_common::time::LocalTime;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sfl-api")]
#[command(about = "Read-only sentiment impressions API")]
#[command(version)]
struct Args {
    /// Config file (default: $SFL_CONFIG, ~/.config/sfl/config.toml, /etc/sfl/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path, overrides the config file
    #[arg(short, long, env = "SFL_DATABASE")]
    database: Option<PathBuf>,

    /// Listen port, overrides the config file
    #[arg(short, long, env = "SFL_API_PORT")]
    port: Option<u16>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref());
    init_tracing(config.as_ref().map(|c| &c.logging).unwrap_or(&LoggingConfig::default()))?;

    info!("Starting SFL API (sfl-api) v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config.context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    info!("Database path: {}", config.database_path.display());
    let pool = match connect_readonly(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let local = LocalTime::from_offset_minutes(config.fetch.utc_offset_minutes)?;
    let state = AppState::new(Arc::new(SqliteStore::new(pool)), config.api.day_offset, local);
    let app = build_router(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("sfl-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
