//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::config::ApiConfig;
use crate::indexer::Aggregator;
use crate::ingest::IngestProgress;
use crate::websocket::{ConnectionHub, HubConfig};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Buckets answering count and popularity queries
    pub aggregator: Arc<Aggregator>,
    /// Ingestion counters (readiness + monitoring)
    pub progress: Arc<IngestProgress>,
    /// Monitoring connection hub
    pub hub: Arc<ConnectionHub>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        aggregator: Arc<Aggregator>,
        progress: Arc<IngestProgress>,
        config: ApiConfig,
    ) -> Self {
        Self::with_hub(
            aggregator,
            progress,
            config,
            Arc::new(ConnectionHub::new(HubConfig::default())),
        )
    }

    /// Create AppState sharing an existing monitoring hub
    pub fn with_hub(
        aggregator: Arc<Aggregator>,
        progress: Arc<IngestProgress>,
        config: ApiConfig,
        hub: Arc<ConnectionHub>,
    ) -> Self {
        Self {
            aggregator,
            progress,
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
