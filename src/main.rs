//! RoadWatch server
//!
//! # Usage
//!
//! ```bash
//! # Defaults, sled store under ./data/roadwatch
//! cargo run --release
//!
//! # Explicit config and in-memory store
//! cargo run --release -- --config roadwatch.toml --memory
//! ```
//!
//! # Environment Variables
//!
//! - `ROADWATCH_CONFIG`: path to a TOML config file
//! - `ROADWATCH_CORS_ORIGINS`: comma-separated allowed browser origins
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use roadwatch::api::{create_app, AppState};
use roadwatch::config::{defaults, AppConfig, StorageBackend};
use roadwatch::geocode::{Geocoder, NominatimGeocoder};
use roadwatch::refresh::{snapshot_refresh, RefreshScheduler};
use roadwatch::storage::{InMemoryStore, SledStore};
use roadwatch::SubmissionAdmission;

#[derive(Parser, Debug)]
#[command(name = "roadwatch")]
#[command(about = "RoadWatch traffic incident service")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides the standard search order)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:8080
    #[arg(long)]
    addr: Option<String>,

    /// Keep everything in memory instead of the sled store
    #[arg(long)]
    memory: bool,
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::load(),
    };
    for warning in config.validate() {
        warn!("[Config] {}", warning);
    }
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }
    Ok(config)
}

fn build_state(config: &AppConfig, admission: Arc<SubmissionAdmission>) -> Result<AppState> {
    let geocoder: Arc<dyn Geocoder> = Arc::new(
        NominatimGeocoder::new(&config.geocoder).context("building geocoder client")?,
    );

    let state = match config.storage.backend {
        StorageBackend::Memory => {
            info!("[Storage] Using in-memory store");
            AppState::new(Arc::new(InMemoryStore::new()), admission, geocoder)
        }
        StorageBackend::Sled => {
            let dir = &config.storage.data_dir;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data dir {}", dir.display()))?;
            let store = SledStore::open(dir)
                .with_context(|| format!("opening sled store at {}", dir.display()))?;
            info!(path = %dir.display(), "[Storage] Using sled store");
            AppState::new(Arc::new(store), admission, geocoder)
        }
    };
    Ok(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let admission = Arc::new(SubmissionAdmission::from_config(&config.admission));
    let sweeper = admission.clone().spawn_sweeper(
        Duration::from_secs(config.admission.sweep_interval_secs.max(1)),
        cancel_token.clone(),
    );

    let state = build_state(&config, admission)?;

    let (tx, rx) = watch::channel(None);
    let interval_ms = config.refresh.interval_ms.max(defaults::MIN_REFRESH_INTERVAL_MS);
    let scheduler = Arc::new(RefreshScheduler::new(
        interval_ms,
        snapshot_refresh(state.incidents.clone(), state.queue.clone(), tx),
    )?);
    scheduler.start();
    let state = state.with_refresh(scheduler.clone(), rx);

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("binding {}", config.server.addr))?;
    info!(addr = %config.server.addr, "[HttpServer] Listening");

    let server_token = cancel_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await
        .context("HTTP server error")?;

    scheduler.stop();
    cancel_token.cancel();
    sweeper.await.ok();
    info!("[HttpServer] Graceful shutdown complete");
    Ok(())
}
