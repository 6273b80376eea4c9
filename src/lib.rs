//! # Querylens
//!
//! Concurrent search-query log analytics: how many distinct queries were made
//! in a given year, month, day, hour or minute, and which were the most
//! popular.
//!
//! ## Features
//!
//! - **Five precisions at once**: every record is counted in its Year, Month,
//!   Day, Hour and Minute bucket
//! - **Lock-free ranking**: each bucket is owned by its own worker task, reads
//!   jump ahead of queued writes
//! - **Shared query text**: one interned copy per distinct query
//! - **Live serving**: HTTP queries and a progress WebSocket while ingesting
//!
//! ## Modules
//!
//! - [`indexer`]: Interner, time ranges, ranked indexes, aggregator
//! - [`ingest`]: Query log ingestion pipeline
//! - [`api`]: REST API server with Axum
//! - [`websocket`]: Ingestion progress streaming
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use querylens::indexer::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let aggregator = Aggregator::new(Arc::new(StringInterner::new()), IndexConfig::default());
//!
//!     for record in TraceReader::new(std::fs::File::open("hn_logs.tsv")?) {
//!         aggregator.add(&record?).await?;
//!     }
//!
//!     let day = TimeRange::parse("2015-08-01")?;
//!     if let Some(index) = aggregator.get_index(&day) {
//!         println!("{} distinct queries", index.size().await?);
//!         for q in index.top(3).await? {
//!             println!("{} {}", q.count, q.query);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod indexer;
pub mod ingest;
pub mod websocket;

// Re-export top-level types for convenience
pub use indexer::{
    Aggregator, IndexConfig, IndexerError, IndexerResult, InternedHandle, Precision,
    RankedIndex, RankingStrategy, Record, StringInterner, TimeRange, TopQuery, TraceReader,
};

pub use ingest::{IngestProgress, IngestReport, Ingestor, ProgressSnapshot};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{
    spawn_progress_broadcaster, websocket_handler, ClientMessage, ConnectionHub, HubConfig,
    HubError, ServerMessage,
};

pub use config::{Config, ConfigError, LoadedConfig, LoggingConfig};
