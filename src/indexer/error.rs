//! Indexer error types
//!
//! Defines all errors that can occur in the aggregation core and its
//! record-reading collaborator.

use crate::indexer::time_range::Precision;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while indexing or querying search traces
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Time range text matched no bucket pattern, or did not decode under it
    #[error("Invalid time range: {literal:?}")]
    Format { literal: String },

    /// The bounded write queue of an index did not accept the request in time
    #[error("Index queue is full, occurrence was not applied")]
    Backpressure,

    /// The worker owning an index is gone
    #[error("Index worker unavailable")]
    WorkerUnavailable,

    /// The request was queued but no reply arrived in time; it may still apply
    #[error("Timed out waiting for index worker")]
    Timeout,

    /// One precision of a record fan-out failed; the others were still applied
    #[error("Failed to index bucket {bucket} ({precision}), no rollback of other buckets: {source}")]
    PartialAggregation {
        precision: Precision,
        bucket: String,
        #[source]
        source: Box<IndexerError>,
    },

    /// Timestamp whose year has no fixed-width bucket text
    #[error("Timestamp {timestamp} is outside the supported years 0000-9999")]
    UnsupportedTimestamp { timestamp: DateTime<Utc> },

    /// Malformed line in a query log
    #[error("Invalid record at line {line}: {reason}")]
    Record { line: u64, reason: String },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexerError {
    /// Create a format error carrying the offending text
    pub fn format(literal: impl Into<String>) -> Self {
        IndexerError::Format {
            literal: literal.into(),
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::Backpressure | IndexerError::Timeout => true,
            IndexerError::PartialAggregation { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;
