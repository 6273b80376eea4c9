//! Querylens Server
//!
//! Ingests a search-query log and serves distinct counts and popular queries
//! over HTTP while ingestion is still running.
//!
//! Run with: cargo run --bin querylens -- --log hn_logs.tsv
//!
//! # Configuration
//!
//! Loaded from `--config`, or the default locations (see `Config::load_default`),
//! then `QUERYLENS_*` environment variables, then command-line flags.
//! `RUST_LOG` overrides the configured log level.

use clap::Parser;
use querylens::api::{serve, AppState};
use querylens::config::{Config, LoadedConfig, LoggingConfig};
use querylens::indexer::{Aggregator, StringInterner};
use querylens::ingest::{IngestProgress, Ingestor};
use querylens::websocket::{spawn_progress_broadcaster, ConnectionHub, HubConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "querylens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search-query log analytics server")]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Query log to ingest (tab-separated)
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(short, long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let LoadedConfig {
        mut config,
        source,
        warnings,
    } = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(log) = args.log {
        config.ingest.log_path = log;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting Querylens v{}", env!("CARGO_PKG_VERSION"));
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }
    tracing::info!(
        strategy = ?config.index.strategy,
        queue_capacity = config.index.queue_capacity,
        "Index settings"
    );

    let aggregator = Arc::new(Aggregator::new(
        Arc::new(StringInterner::new()),
        config.index.to_index_config(),
    ));
    let progress = Arc::new(IngestProgress::new());
    let hub = Arc::new(ConnectionHub::new(HubConfig {
        max_connections: config.websocket.max_connections,
    }));

    let broadcaster = spawn_progress_broadcaster(
        Arc::clone(&hub),
        Arc::clone(&progress),
        Duration::from_millis(config.websocket.progress_interval_ms),
    );

    // Queries are served while the log is still loading
    let ingestor = Ingestor::new(
        Arc::clone(&aggregator),
        Arc::clone(&progress),
        config.ingest.max_in_flight,
    );
    let log_path = config.ingest.log_path.clone();
    let ingest_task = tokio::spawn(async move {
        match ingestor.ingest_file(&log_path).await {
            Ok(report) => tracing::info!("Completed ingestion of {:?}: {}", log_path, report),
            Err(e) => tracing::error!("Ingestion of {:?} failed: {}", log_path, e),
        }
    });

    let addr = args.addr.unwrap_or_else(|| config.api.bind_addr());
    let state = AppState::with_hub(aggregator, progress, config.api.clone(), hub);
    let result = serve(state, &addr).await;

    ingest_task.abort();
    broadcaster.abort();

    result?;
    tracing::info!("Querylens stopped");
    Ok(())
}

/// Install the global subscriber: `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("querylens={},tower_http={}", logging.level, logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
