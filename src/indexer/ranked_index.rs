//! Ranked Index - one bucket's distinct count and popularity order
//!
//! Each index is a handle to a dedicated worker task that exclusively owns
//! the ranking state. Callers never lock anything: they send a request and
//! await the worker's reply.
//!
//! ```text
//!   add(h) ──► writes (bounded) ──┐
//!                                 ├──► worker ──► Ranking (counts + order)
//!   size/top ─► reads (unbounded) ┘      ▲
//!                                        └─ pending reads served first
//! ```
//!
//! Every request is applied in the worker's dequeue order, so all operations
//! on one index form a single total order. A read observes every add whose
//! call already returned; adds still in flight from other callers may or may
//! not be visible.

use crate::indexer::error::{IndexerError, IndexerResult};
use crate::indexer::interner::{InternedHandle, StringInterner};
use crate::indexer::ranking::Ranking;
use crate::indexer::IndexConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// A query and how many times it occurred in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopQuery {
    pub query: String,
    pub count: u64,
}

impl TopQuery {
    pub fn new(query: impl Into<String>, count: u64) -> Self {
        Self {
            query: query.into(),
            count,
        }
    }
}

struct WriteRequest {
    handle: InternedHandle,
    reply: oneshot::Sender<u64>,
}

enum ReadRequest {
    Size {
        reply: oneshot::Sender<usize>,
    },
    Top {
        n: usize,
        reply: oneshot::Sender<Vec<TopQuery>>,
    },
    Count {
        handle: InternedHandle,
        reply: oneshot::Sender<u64>,
    },
}

struct Channels {
    writes: mpsc::Sender<WriteRequest>,
    reads: mpsc::UnboundedSender<ReadRequest>,
    request_timeout: Option<Duration>,
}

/// Handle to one bucket's ranking worker
///
/// Cloning is cheap; all clones talk to the same worker. The worker stops
/// once every clone is dropped.
#[derive(Clone)]
pub struct RankedIndex {
    channels: Arc<Channels>,
}

impl std::fmt::Debug for RankedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankedIndex")
            .field("queued_writes", &self.queued_writes())
            .field("request_timeout", &self.channels.request_timeout)
            .finish()
    }
}

impl RankedIndex {
    /// Create an index and start its worker
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(interner: Arc<StringInterner>, config: &IndexConfig) -> Self {
        let (index, worker) = Self::unstarted(interner, config);
        tokio::spawn(worker.run());
        index
    }

    /// Create an index whose worker has not been started yet
    pub(crate) fn unstarted(
        interner: Arc<StringInterner>,
        config: &IndexConfig,
    ) -> (Self, Worker) {
        let (writes_tx, writes_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (reads_tx, reads_rx) = mpsc::unbounded_channel();

        let index = Self {
            channels: Arc::new(Channels {
                writes: writes_tx,
                reads: reads_tx,
                request_timeout: config.request_timeout,
            }),
        };
        let worker = Worker {
            state: WorkerState {
                ranking: config.strategy.build(),
                interner,
            },
            writes: writes_rx,
            reads: reads_rx,
        };

        (index, worker)
    }

    /// Whether two handles refer to the same index
    pub fn same_index(a: &RankedIndex, b: &RankedIndex) -> bool {
        Arc::ptr_eq(&a.channels, &b.channels)
    }

    /// Record one occurrence of `handle`, returning its new count
    ///
    /// Resolves once the worker has applied the occurrence. On
    /// `Backpressure` it was not applied; on `Timeout` it may still be.
    pub async fn add(&self, handle: InternedHandle) -> IndexerResult<u64> {
        let (reply, rx) = oneshot::channel();
        let request = WriteRequest { handle, reply };

        let deadline = match self.channels.request_timeout {
            Some(limit) => {
                let deadline = Instant::now() + limit;
                self.channels
                    .writes
                    .send_timeout(request, limit)
                    .await
                    .map_err(|e| match e {
                        SendTimeoutError::Timeout(_) => IndexerError::Backpressure,
                        SendTimeoutError::Closed(_) => IndexerError::WorkerUnavailable,
                    })?;
                Some(deadline)
            }
            None => {
                self.channels
                    .writes
                    .send(request)
                    .await
                    .map_err(|_| IndexerError::WorkerUnavailable)?;
                None
            }
        };

        await_reply(rx, deadline).await
    }

    /// Number of distinct queries in this bucket
    pub async fn size(&self) -> IndexerResult<usize> {
        self.read(|reply| ReadRequest::Size { reply }).await
    }

    /// The `n` most frequent queries, most frequent first
    pub async fn top(&self, n: usize) -> IndexerResult<Vec<TopQuery>> {
        self.read(|reply| ReadRequest::Top { n, reply }).await
    }

    /// Current count of one query (0 if it never occurred here)
    pub async fn count(&self, handle: InternedHandle) -> IndexerResult<u64> {
        self.read(|reply| ReadRequest::Count { handle, reply }).await
    }

    /// Writes waiting in the queue (approximate)
    pub fn queued_writes(&self) -> usize {
        self.channels.writes.max_capacity() - self.channels.writes.capacity()
    }

    async fn read<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ReadRequest,
    ) -> IndexerResult<T> {
        let (reply, rx) = oneshot::channel();
        let deadline = self.channels.request_timeout.map(|limit| Instant::now() + limit);

        self.channels
            .reads
            .send(make(reply))
            .map_err(|_| IndexerError::WorkerUnavailable)?;

        await_reply(rx, deadline).await
    }
}

async fn await_reply<T>(rx: oneshot::Receiver<T>, deadline: Option<Instant>) -> IndexerResult<T> {
    let reply = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, rx)
            .await
            .map_err(|_| IndexerError::Timeout)?,
        None => rx.await,
    };
    reply.map_err(|_| IndexerError::WorkerUnavailable)
}

struct WorkerState {
    ranking: Box<dyn Ranking>,
    interner: Arc<StringInterner>,
}

impl WorkerState {
    fn apply(&mut self, request: WriteRequest) {
        let count = self.ranking.record(request.handle);
        // The caller may have timed out; the occurrence stays applied.
        let _ = request.reply.send(count);
    }

    fn serve(&mut self, request: ReadRequest) {
        match request {
            ReadRequest::Size { reply } => {
                let _ = reply.send(self.ranking.len());
            }
            ReadRequest::Top { n, reply } => {
                self.ranking.settle();
                let top = self
                    .ranking
                    .top(n)
                    .into_iter()
                    .filter_map(|(handle, count)| {
                        self.interner
                            .resolve(handle)
                            .map(|text| TopQuery::new(&*text, count))
                    })
                    .collect();
                let _ = reply.send(top);
            }
            ReadRequest::Count { handle, reply } => {
                let _ = reply.send(self.ranking.count(handle));
            }
        }
    }
}

pub(crate) struct Worker {
    state: WorkerState,
    writes: mpsc::Receiver<WriteRequest>,
    reads: mpsc::UnboundedReceiver<ReadRequest>,
}

impl Worker {
    pub(crate) async fn run(self) {
        let Worker {
            mut state,
            mut writes,
            mut reads,
        } = self;

        tracing::trace!("Ranked index worker started");

        loop {
            // Pending reads always go before pending writes
            match reads.try_recv() {
                Ok(request) => {
                    state.serve(request);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            match writes.try_recv() {
                Ok(request) => {
                    state.apply(request);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            // Both queues drained
            state.ranking.settle();

            tokio::select! {
                biased;
                Some(request) = reads.recv() => state.serve(request),
                Some(request) = writes.recv() => state.apply(request),
                else => break,
            }
        }

        tracing::trace!("Ranked index worker stopped");
    }
}
