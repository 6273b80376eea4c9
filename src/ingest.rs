//! Query log ingestion
//!
//! Streams a query log into the aggregator:
//!
//! ```text
//! file ──► TraceReader (blocking thread) ──► bounded channel
//!                                              ↓
//!                      one task per record, at most `max_in_flight` at once
//!                                              ↓
//!                                   Aggregator.add ──► IngestProgress
//! ```
//!
//! Malformed lines are logged and counted as rejected; ingestion carries on.

use crate::indexer::{Aggregator, IndexerError, IndexerResult, Record, TraceReader};
use serde::Serialize;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};

/// Live ingestion counters, shared with the API and the monitoring socket
#[derive(Debug, Default)]
pub struct IngestProgress {
    indexed: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    completed: AtomicBool,
}

/// Point-in-time copy of [`IngestProgress`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Records applied to all five buckets
    pub indexed: u64,
    /// Malformed log lines skipped
    pub rejected: u64,
    /// Records at least one bucket failed to apply
    pub failed: u64,
    pub completed: bool,
}

impl IngestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            indexed: self.indexed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            completed: self.is_completed(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub indexed: u64,
    pub rejected: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} indexed, {} rejected, {} failed in {:.2?}",
            self.indexed, self.rejected, self.failed, self.elapsed
        )
    }
}

/// Feeds query logs into an aggregator
pub struct Ingestor {
    aggregator: Arc<Aggregator>,
    progress: Arc<IngestProgress>,
    max_in_flight: usize,
}

impl Ingestor {
    pub fn new(
        aggregator: Arc<Aggregator>,
        progress: Arc<IngestProgress>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            aggregator,
            progress,
            max_in_flight: max_in_flight.clamp(1, u32::MAX as usize),
        }
    }

    /// Ingest a query log file
    pub async fn ingest_file(&self, path: &Path) -> IndexerResult<IngestReport> {
        let file = std::fs::File::open(path)?;
        tracing::info!("Ingesting query log {:?}", path);
        self.ingest_reader(BufReader::new(file)).await
    }

    /// Ingest every record from `input`
    ///
    /// Returns once every accepted record has finished indexing. Progress is
    /// marked completed only when the whole input was read.
    pub async fn ingest_reader<R>(&self, input: R) -> IndexerResult<IngestReport>
    where
        R: Read + Send + 'static,
    {
        let start = Instant::now();
        let before = self.progress.snapshot();

        let (tx, mut rx) = mpsc::channel::<Record>(self.max_in_flight);
        let progress = Arc::clone(&self.progress);

        let reader = tokio::task::spawn_blocking(move || -> IndexerResult<()> {
            for result in TraceReader::new(input) {
                match result {
                    Ok(record) => {
                        // Receiver gone: ingestion was abandoned
                        if tx.blocking_send(record).is_err() {
                            break;
                        }
                    }
                    Err(IndexerError::Io(e)) => return Err(IndexerError::Io(e)),
                    Err(e) => {
                        progress.rejected.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "Skipping malformed log line");
                    }
                }
            }
            Ok(())
        });

        let permits = Arc::new(Semaphore::new(self.max_in_flight));

        while let Some(record) = rx.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let aggregator = Arc::clone(&self.aggregator);
            let progress = Arc::clone(&self.progress);

            tokio::spawn(async move {
                match aggregator.add(&record).await {
                    Ok(()) => {
                        progress.indexed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        progress.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            query = %record.query,
                            timestamp = %record.timestamp,
                            error = %e,
                            "Failed to index record"
                        );
                    }
                }
                drop(permit);
            });
        }

        // Every permit back means every record task has finished
        let _drained = permits.acquire_many(self.max_in_flight as u32).await;

        reader
            .await
            .map_err(|e| IndexerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        self.progress.mark_completed();

        let after = self.progress.snapshot();
        let report = IngestReport {
            indexed: after.indexed - before.indexed,
            rejected: after.rejected - before.rejected,
            failed: after.failed - before.failed,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            indexed = report.indexed,
            rejected = report.rejected,
            failed = report.failed,
            buckets = self.aggregator.bucket_count(),
            "Ingestion finished in {:.2?}",
            report.elapsed
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{IndexConfig, StringInterner, TimeRange, TopQuery};
    use std::io::Write;

    fn setup(max_in_flight: usize) -> (Arc<Aggregator>, Arc<IngestProgress>, Ingestor) {
        let aggregator = Arc::new(Aggregator::new(
            Arc::new(StringInterner::new()),
            IndexConfig::default(),
        ));
        let progress = Arc::new(IngestProgress::new());
        let ingestor = Ingestor::new(Arc::clone(&aggregator), Arc::clone(&progress), max_in_flight);
        (aggregator, progress, ingestor)
    }

    const LOG: &str = "2015-08-01 00:03:43\tq1\n\
                       2015-08-02 00:03:43\tq1\n\
                       garbage line\n\
                       2015-08-02 00:03:44\tq2\n\
                       2015-08-02 00:05:45\tq3\n\
                       2015-08-02 00:05:46\tq1\n";

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ingest_reader() {
        let (aggregator, progress, ingestor) = setup(16);
        assert!(!progress.is_completed());

        let report = ingestor.ingest_reader(LOG.as_bytes()).await.unwrap();
        assert_eq!(report.indexed, 5);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.failed, 0);

        assert_eq!(
            progress.snapshot(),
            ProgressSnapshot {
                indexed: 5,
                rejected: 1,
                failed: 0,
                completed: true,
            }
        );

        let day = TimeRange::parse("2015-08-02").unwrap();
        let index = aggregator.get_index(&day).unwrap();
        assert_eq!(index.size().await.unwrap(), 3);
        assert_eq!(index.top(1).await.unwrap(), vec![TopQuery::new("q1", 2)]);
    }

    #[tokio::test]
    async fn test_single_record_in_flight() {
        let (aggregator, _progress, ingestor) = setup(1);

        let report = ingestor.ingest_reader(LOG.as_bytes()).await.unwrap();
        assert_eq!(report.indexed, 5);

        let year = TimeRange::parse("2015").unwrap();
        assert_eq!(aggregator.get_index(&year).unwrap().size().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ingest_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LOG.as_bytes()).unwrap();
        file.flush().unwrap();

        let (aggregator, progress, ingestor) = setup(64);
        let report = ingestor.ingest_file(file.path()).await.unwrap();

        assert_eq!(report.indexed, 5);
        assert!(progress.is_completed());
        // 2 days, 1 month, 1 year, 2 hours, 3 minutes
        assert_eq!(aggregator.bucket_count(), 9);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (_aggregator, progress, ingestor) = setup(8);
        let result = ingestor
            .ingest_file(Path::new("/nonexistent/hn_logs.tsv"))
            .await;

        assert!(matches!(result, Err(IndexerError::Io(_))));
        assert!(!progress.is_completed());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (aggregator, progress, ingestor) = setup(8);
        let report = ingestor.ingest_reader(std::io::empty()).await.unwrap();

        assert_eq!(report.indexed, 0);
        assert_eq!(aggregator.bucket_count(), 0);
        assert!(progress.is_completed());
    }
}
