//! Aggregator - buckets of ranked indexes
//!
//! Every record lands in five buckets, one per precision:
//!
//! ```text
//! (2015-08-02 00:03:43, "q1")
//!        ↓ truncate
//! "2015" "2015-08" "2015-08-02" "2015-08-02 00" "2015-08-02 00:03"
//!        ↓ get-or-create (double-checked)
//! RankedIndex × 5 ──► add(intern("q1")) concurrently
//! ```
//!
//! The bucket map only grows. Its lock is held for the lookup-or-insert step
//! alone, never while an index call is outstanding.

use crate::indexer::error::{IndexerError, IndexerResult};
use crate::indexer::interner::StringInterner;
use crate::indexer::ranked_index::RankedIndex;
use crate::indexer::time_range::TimeRange;
use crate::indexer::trace::Record;
use crate::indexer::IndexConfig;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Owns every bucket's ranked index
pub struct Aggregator {
    /// Bucket key (canonical time range text) → index
    indexes: RwLock<HashMap<String, RankedIndex>>,
    interner: Arc<StringInterner>,
    config: IndexConfig,
}

impl Aggregator {
    pub fn new(interner: Arc<StringInterner>, config: IndexConfig) -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            interner,
            config,
        }
    }

    /// Index one record into all five of its buckets
    ///
    /// Returns once every bucket has been attempted. If one fails the others
    /// are still applied and the first failure (coarsest precision first) is
    /// returned; nothing is rolled back.
    ///
    /// Records outside [`SUPPORTED_YEARS`](crate::indexer::time_range::SUPPORTED_YEARS)
    /// are refused before anything is interned or created.
    pub async fn add(&self, record: &Record) -> IndexerResult<()> {
        if !TimeRange::supports(record.timestamp) {
            return Err(IndexerError::UnsupportedTimestamp {
                timestamp: record.timestamp,
            });
        }

        let handle = self.interner.intern(&record.query);

        let contributions = TimeRange::all_for(record.timestamp).map(|range| {
            let index = self.get_or_create_index(&range);
            async move { (range, index.add(handle).await) }
        });

        let mut first_error = None;
        for (range, result) in join_all(contributions).await {
            if let Err(e) = result {
                tracing::warn!(
                    bucket = %range,
                    precision = %range.precision(),
                    error = %e,
                    "Failed to index query"
                );
                if first_error.is_none() {
                    first_error = Some(IndexerError::PartialAggregation {
                        precision: range.precision(),
                        bucket: range.key(),
                        source: Box::new(e),
                    });
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Look up a bucket without creating it
    pub fn get_index(&self, range: &TimeRange) -> Option<RankedIndex> {
        let key = range.key();
        let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
        indexes.get(&key).cloned()
    }

    /// Return the bucket's index, creating exactly one on first use
    ///
    /// Must be called from within a Tokio runtime (a new index spawns its
    /// worker).
    pub fn get_or_create_index(&self, range: &TimeRange) -> RankedIndex {
        let key = range.key();

        // Fast path: bucket exists (read lock only)
        {
            let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = indexes.get(&key) {
                return index.clone();
            }
        }

        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have created it between our two locks
        if let Some(index) = indexes.get(&key) {
            return index.clone();
        }

        let index = RankedIndex::spawn(Arc::clone(&self.interner), &self.config);
        tracing::debug!(bucket = %key, precision = %range.precision(), "Created bucket");
        indexes.insert(key, index.clone());
        index
    }

    /// Number of buckets created so far
    pub fn bucket_count(&self) -> usize {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn interner(&self) -> &Arc<StringInterner> {
        &self.interner
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }
}
