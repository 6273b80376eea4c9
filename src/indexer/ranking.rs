//! Frequency ranking structures
//!
//! The state a `RankedIndex` worker owns: a count per handle plus an order
//! by count. Two interchangeable strategies:
//!
//! - **SelfOrderingList**: arena-backed doubly linked list kept ascending by
//!   count. An incremented entry slides toward the high end past every
//!   neighbour it now outranks, so the cost is the distance moved rather than
//!   a full sort. Popular queries sit near the high end and move little.
//! - **DeferredSort**: counts in a map, order in a vector that is re-sorted
//!   only on `settle()`, batching the O(n log n) sort over bursts of writes.
//!
//! Ties between equal counts are left in whatever order the strategy
//! produces.

use crate::indexer::interner::InternedHandle;
use serde::Deserialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Count + order bookkeeping for one bucket
///
/// Implementations are single-owner: only the index worker touches them.
pub trait Ranking: Send {
    /// Record one occurrence of `handle`, returning its new count
    fn record(&mut self, handle: InternedHandle) -> u64;

    /// Number of distinct handles recorded
    fn len(&self) -> usize;

    /// Current count of `handle` (0 if never recorded)
    fn count(&self, handle: InternedHandle) -> u64;

    /// Up to `n` handles with the highest counts, highest first
    fn top(&self, n: usize) -> Vec<(InternedHandle, u64)>;

    /// Bring the order fully up to date with the counts
    fn settle(&mut self) {}

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which ranking structure new indexes use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Re-order incrementally on every add
    #[default]
    Incremental,
    /// Re-sort the whole order when the write queue drains
    DeferredSort,
}

impl RankingStrategy {
    pub fn build(&self) -> Box<dyn Ranking> {
        match self {
            RankingStrategy::Incremental => Box::new(SelfOrderingList::new()),
            RankingStrategy::DeferredSort => Box::new(DeferredSort::new()),
        }
    }
}

impl std::str::FromStr for RankingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(RankingStrategy::Incremental),
            "deferred_sort" | "deferred-sort" | "deferred" => Ok(RankingStrategy::DeferredSort),
            other => Err(format!("unknown ranking strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    handle: InternedHandle,
    count: u64,
    /// Neighbour toward the low-count end
    prev: Option<usize>,
    /// Neighbour toward the high-count end
    next: Option<usize>,
}

/// Doubly linked list over an index arena, ascending by count
#[derive(Debug, Default)]
pub struct SelfOrderingList {
    nodes: Vec<Node>,
    /// Handle → arena slot
    slots: HashMap<InternedHandle, usize>,
    /// Lowest-count end
    low: Option<usize>,
    /// Highest-count end
    high: Option<usize>,
}

impl SelfOrderingList {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_low(&mut self, handle: InternedHandle) {
        let slot = self.nodes.len();
        self.nodes.push(Node {
            handle,
            count: 1,
            prev: None,
            next: self.low,
        });

        match self.low {
            Some(old_low) => self.nodes[old_low].prev = Some(slot),
            None => self.high = Some(slot),
        }
        self.low = Some(slot);
        self.slots.insert(handle, slot);
    }

    fn unlink(&mut self, slot: usize) {
        let Node { prev, next, .. } = self.nodes[slot];

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.low = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.high = prev,
        }

        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn link_after(&mut self, slot: usize, anchor: usize) {
        let next = self.nodes[anchor].next;

        self.nodes[slot].prev = Some(anchor);
        self.nodes[slot].next = next;
        self.nodes[anchor].next = Some(slot);

        match next {
            Some(n) => self.nodes[n].prev = Some(slot),
            None => self.high = Some(slot),
        }
    }

    /// Counts from the low end to the high end
    #[cfg(test)]
    fn ascending_counts(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.low;
        while let Some(slot) = cursor {
            out.push(self.nodes[slot].count);
            cursor = self.nodes[slot].next;
        }
        out
    }
}

impl Ranking for SelfOrderingList {
    fn record(&mut self, handle: InternedHandle) -> u64 {
        let Some(&slot) = self.slots.get(&handle) else {
            self.push_low(handle);
            return 1;
        };

        self.nodes[slot].count += 1;
        let count = self.nodes[slot].count;

        // Slide past every neighbour that is now strictly behind
        let mut anchor = slot;
        while let Some(next) = self.nodes[anchor].next {
            if self.nodes[next].count < count {
                anchor = next;
            } else {
                break;
            }
        }

        if anchor != slot {
            self.unlink(slot);
            self.link_after(slot, anchor);
        }

        count
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn count(&self, handle: InternedHandle) -> u64 {
        self.slots
            .get(&handle)
            .map(|&slot| self.nodes[slot].count)
            .unwrap_or(0)
    }

    fn top(&self, n: usize) -> Vec<(InternedHandle, u64)> {
        let mut out = Vec::with_capacity(n.min(self.nodes.len()));
        let mut cursor = self.high;
        while let Some(slot) = cursor {
            if out.len() == n {
                break;
            }
            let node = &self.nodes[slot];
            out.push((node.handle, node.count));
            cursor = node.prev;
        }
        out
    }
}

/// Count map + lazily sorted order
#[derive(Debug, Default)]
pub struct DeferredSort {
    counts: HashMap<InternedHandle, u64>,
    /// Descending by count once settled
    order: Vec<InternedHandle>,
    dirty: bool,
}

impl DeferredSort {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ranking for DeferredSort {
    fn record(&mut self, handle: InternedHandle) -> u64 {
        let count = self.counts.entry(handle).or_insert_with(|| {
            self.order.push(handle);
            0
        });
        *count += 1;
        self.dirty = true;
        *count
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn count(&self, handle: InternedHandle) -> u64 {
        self.counts.get(&handle).copied().unwrap_or(0)
    }

    fn top(&self, n: usize) -> Vec<(InternedHandle, u64)> {
        self.order
            .iter()
            .take(n)
            .map(|&h| (h, self.count(h)))
            .collect()
    }

    fn settle(&mut self) {
        if !self.dirty {
            return;
        }
        let counts = &self.counts;
        self.order
            .sort_unstable_by_key(|h| Reverse(counts.get(h).copied().unwrap_or(0)));
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::interner::StringInterner;

    /// Deterministic pseudo-random handle stream
    fn scrambled(n: usize, distinct: usize, seed: u64) -> Vec<usize> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                // Skew toward small indexes so some entries get hot
                let r = (state >> 33) as usize % (distinct * distinct);
                (r as f64).sqrt() as usize % distinct
            })
            .collect()
    }

    fn handles(interner: &StringInterner, distinct: usize) -> Vec<InternedHandle> {
        (0..distinct)
            .map(|i| interner.intern(&format!("Query {}", i)))
            .collect()
    }

    fn assert_descending(top: &[(InternedHandle, u64)]) {
        for pair in top.windows(2) {
            assert!(pair[0].1 >= pair[1].1, "not descending: {:?}", top);
        }
    }

    #[test]
    fn test_new_entries_start_at_low_end() {
        let interner = StringInterner::new();
        let hs = handles(&interner, 3);
        let mut list = SelfOrderingList::new();

        list.record(hs[0]);
        list.record(hs[0]);
        list.record(hs[1]);

        assert_eq!(list.ascending_counts(), vec![1, 2]);
        assert_eq!(list.top(1), vec![(hs[0], 2)]);

        list.record(hs[2]);
        assert_eq!(list.ascending_counts(), vec![1, 1, 2]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_increment_slides_past_smaller_neighbours() {
        let interner = StringInterner::new();
        let hs = handles(&interner, 4);
        let mut list = SelfOrderingList::new();

        // counts: h0=3, h1=2, h2=1
        for (h, times) in [(hs[0], 3), (hs[1], 2), (hs[2], 1)] {
            for _ in 0..times {
                list.record(h);
            }
        }
        assert_eq!(list.ascending_counts(), vec![1, 2, 3]);

        // h2 goes 1 -> 2 -> 3 -> 4 and ends at the top
        assert_eq!(list.record(hs[2]), 2);
        assert_eq!(list.record(hs[2]), 3);
        assert_eq!(list.record(hs[2]), 4);
        assert_eq!(list.ascending_counts(), vec![2, 3, 4]);
        assert_eq!(list.top(1), vec![(hs[2], 4)]);
    }

    #[test]
    fn test_top_bounded_by_size() {
        let interner = StringInterner::new();
        let hs = handles(&interner, 2);

        for strategy in [RankingStrategy::Incremental, RankingStrategy::DeferredSort] {
            let mut ranking = strategy.build();
            assert!(ranking.is_empty());
            assert!(ranking.top(5).is_empty());

            ranking.record(hs[0]);
            ranking.record(hs[1]);
            ranking.record(hs[1]);
            ranking.settle();

            let top = ranking.top(5);
            assert_eq!(top.len(), 2);
            assert_eq!(top[0], (hs[1], 2));
            assert!(ranking.top(0).is_empty());
        }
    }

    #[test]
    fn test_order_invariant_holds_after_every_add() {
        let interner = StringInterner::new();
        let hs = handles(&interner, 40);
        let mut list = SelfOrderingList::new();

        for i in scrambled(2_000, 40, 7) {
            list.record(hs[i]);
            let counts = list.ascending_counts();
            assert!(
                counts.windows(2).all(|w| w[0] <= w[1]),
                "order broken: {:?}",
                counts
            );
        }
    }

    #[test]
    fn test_strategies_agree_on_counts() {
        let interner = StringInterner::new();
        let hs = handles(&interner, 25);
        let stream = scrambled(5_000, 25, 42);

        let mut oracle: HashMap<InternedHandle, u64> = HashMap::new();
        let mut incremental = RankingStrategy::Incremental.build();
        let mut deferred = RankingStrategy::DeferredSort.build();

        for i in stream {
            let h = hs[i];
            let expected = {
                let c = oracle.entry(h).or_insert(0);
                *c += 1;
                *c
            };
            assert_eq!(incremental.record(h), expected);
            assert_eq!(deferred.record(h), expected);
        }
        deferred.settle();

        assert_eq!(incremental.len(), oracle.len());
        assert_eq!(deferred.len(), oracle.len());

        let full_inc = incremental.top(usize::MAX);
        let full_def = deferred.top(usize::MAX);
        assert_descending(&full_inc);
        assert_descending(&full_def);

        for (h, c) in &oracle {
            assert_eq!(incremental.count(*h), *c);
            assert_eq!(deferred.count(*h), *c);
        }

        // Same multiset of counts at every rank, ties aside
        let inc_counts: Vec<u64> = full_inc.iter().map(|(_, c)| *c).collect();
        let def_counts: Vec<u64> = full_def.iter().map(|(_, c)| *c).collect();
        assert_eq!(inc_counts, def_counts);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "incremental".parse::<RankingStrategy>().unwrap(),
            RankingStrategy::Incremental
        );
        assert_eq!(
            "Deferred_Sort".parse::<RankingStrategy>().unwrap(),
            RankingStrategy::DeferredSort
        );
        assert!("heap".parse::<RankingStrategy>().is_err());
    }
}
