//! String Interner
//!
//! One canonical identity per distinct query text. The same query usually
//! shows up in five buckets (one per precision) and in many records, so the
//! ranked indexes key on a small `InternedHandle` instead of owning copies of
//! the text.
//!
//! # Design Notes
//! - Grows for the lifetime of the process, there is no removal
//! - Lookups of already-interned text take only the shared read lock
//! - A miss escalates to the write lock and re-checks before inserting, so
//!   racing callers on the same new text all observe one handle

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Opaque identity of one distinct query text
///
/// Comparison and hashing are O(1) and never look at the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InternedHandle(usize);

impl InternedHandle {
    /// Get the raw index value
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
struct Pool {
    /// Text → handle
    handles: HashMap<Arc<str>, InternedHandle>,
    /// Handle index → text
    texts: Vec<Arc<str>>,
}

/// Thread-safe, grow-only string pool
///
/// Construct one per process (or per test) and share it as
/// `Arc<StringInterner>` with the aggregator and its indexes.
#[derive(Debug, Default)]
pub struct StringInterner {
    pool: RwLock<Pool>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an interner with room for `capacity` distinct strings
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: RwLock::new(Pool {
                handles: HashMap::with_capacity(capacity),
                texts: Vec::with_capacity(capacity),
            }),
        }
    }

    /// Return the handle for `text`, creating it on first sight
    pub fn intern(&self, text: &str) -> InternedHandle {
        // Fast path: already interned (read lock only)
        if let Some(handle) = self.get(text) {
            return handle;
        }

        // Slow path: a poisoned lock still holds a consistent pool, every
        // mutation below is a single push + insert.
        let mut pool = self.pool.write().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have inserted it between our two locks
        if let Some(&handle) = pool.handles.get(text) {
            return handle;
        }

        let handle = InternedHandle(pool.texts.len());
        let shared: Arc<str> = Arc::from(text);
        pool.texts.push(Arc::clone(&shared));
        pool.handles.insert(shared, handle);
        handle
    }

    /// Look up the handle of already-interned text without creating one
    pub fn get(&self, text: &str) -> Option<InternedHandle> {
        let pool = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        pool.handles.get(text).copied()
    }

    /// Resolve a handle back to its text
    pub fn resolve(&self, handle: InternedHandle) -> Option<Arc<str>> {
        let pool = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        pool.texts.get(handle.0).cloned()
    }

    /// Number of distinct strings interned so far
    pub fn len(&self) -> usize {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .texts
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
