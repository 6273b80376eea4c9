//! Querylens Indexer
//!
//! Distinct counts and top-N popular queries per calendar bucket:
//!
//! - **StringInterner**: one shared handle per distinct query text
//! - **TimeRange**: truncates timestamps to Year/Month/Day/Hour/Minute buckets
//!   and parses bucket prefixes like `2015-08-01 00`
//! - **RankedIndex**: per-bucket counts + popularity order, owned by a worker
//! - **Aggregator**: routes every record into its five buckets
//!
//! # Architecture
//!
//! ```text
//! TraceReader: "2015-08-01 00:03:43\tq1"
//!        ↓
//! Aggregator.add ── intern("q1") ──► handle
//!        ↓ fan-out × 5 precisions
//! RankedIndex["2015"], ["2015-08"], ["2015-08-01"], ["2015-08-01 00"], ["2015-08-01 00:03"]
//!        ↓
//! size() / top(n) answered by the bucket's worker
//! ```

pub mod aggregator;
pub mod error;
pub mod interner;
pub mod ranked_index;
pub mod ranking;
pub mod time_range;
pub mod trace;

pub use aggregator::Aggregator;
pub use error::{IndexerError, IndexerResult};
pub use interner::{InternedHandle, StringInterner};
pub use ranked_index::{RankedIndex, TopQuery};
pub use ranking::{DeferredSort, Ranking, RankingStrategy, SelfOrderingList};
pub use time_range::{Precision, TimeRange};
pub use trace::{Record, TraceReader};

use std::time::Duration;

/// Settings applied to every ranked index an aggregator creates
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Bounded write queue length per index
    pub queue_capacity: usize,
    /// Upper bound on waiting for an index (None = wait forever)
    pub request_timeout: Option<Duration>,
    pub strategy: RankingStrategy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            request_timeout: Some(Duration::from_secs(30)),
            strategy: RankingStrategy::Incremental,
        }
    }
}
