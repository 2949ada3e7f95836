//! Write batching (group commit).
//!
//! Many small write transactions spend most of their time in commit. The
//! batcher queues write calls from concurrent callers and runs the queued
//! calls inside one redb write transaction with one commit. A call waits at
//! most `max_delay` for its batch to fill; a full batch (`max_size` calls) is
//! run immediately by the caller that filled it.
//!
//! If one call in a batch fails, the transaction is rolled back, that caller
//! receives its own error and the remaining calls are run again in a fresh
//! transaction. Calls must therefore tolerate being run more than once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};

use parking_lot::Mutex;
use redb::{Database, Durability};
use tracing::{debug, trace};

use crate::config::BatchConfig;
use crate::error::{StoreError, StoreResult};
use crate::txn::WriteTxn;

/// A queued write call.
pub(crate) type BatchFn = Box<dyn FnMut(&WriteTxn<'_>) -> StoreResult<()> + Send>;

struct Call {
    run: BatchFn,
    done: mpsc::SyncSender<StoreResult<()>>,
}

/// Why a batch attempt did not commit.
enum BatchFailure {
    /// One call failed; the rest may be retried.
    Call { index: usize, error: StoreError },
    /// The transaction itself failed; every call fails.
    Txn(StoreError),
}

/// Batch execution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Number of committed batches.
    pub batches: u64,
    /// Number of calls committed as part of a batch.
    pub calls: u64,
    /// Number of times a batch was re-run after one of its calls failed.
    pub retries: u64,
}

/// Group commit queue.
pub(crate) struct Batcher {
    config: BatchConfig,
    durability: Durability,
    pending: Mutex<Vec<Call>>,
    batches: AtomicU64,
    calls: AtomicU64,
    retries: AtomicU64,
}

impl Batcher {
    pub(crate) fn new(config: BatchConfig, durability: Durability) -> Self {
        Self {
            config,
            durability,
            pending: Mutex::new(Vec::new()),
            batches: AtomicU64::new(0),
            calls: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Queues `run` and blocks until the batch containing it has committed.
    ///
    /// Must not be called from inside another batch call.
    pub(crate) fn submit(&self, db: &Database, run: BatchFn) -> StoreResult<()> {
        let (done, result) = mpsc::sync_channel(1);

        let full = {
            let mut pending = self.pending.lock();
            pending.push(Call { run, done });
            pending.len() >= self.config.max_size
        };

        if full {
            self.flush(db);
        }

        match result.recv_timeout(self.config.max_delay) {
            Ok(outcome) => return outcome,
            Err(RecvTimeoutError::Timeout) => {
                // Nobody picked the batch up in time; run it ourselves.
                self.flush(db);
            }
            Err(RecvTimeoutError::Disconnected) => return Err(StoreError::BatchAborted),
        }

        result.recv().map_err(|_| StoreError::BatchAborted)?
    }

    /// Runs every pending call.
    pub(crate) fn flush(&self, db: &Database) {
        let mut calls = std::mem::take(&mut *self.pending.lock());
        if calls.is_empty() {
            return;
        }
        trace!(calls = calls.len(), "running write batch");

        while !calls.is_empty() {
            match self.run(db, &mut calls) {
                Ok(()) => {
                    self.batches.fetch_add(1, Ordering::Relaxed);
                    self.calls.fetch_add(calls.len() as u64, Ordering::Relaxed);
                    for call in calls.drain(..) {
                        let _ = call.done.send(Ok(()));
                    }
                }
                Err(BatchFailure::Call { index, error }) => {
                    debug!(index, error = %error, "batch call failed, retrying the rest");
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    let failed = calls.remove(index);
                    let _ = failed.done.send(Err(error));
                }
                Err(BatchFailure::Txn(error)) => {
                    debug!(calls = calls.len(), error = %error, "write batch failed");
                    let reason = error.to_string();
                    for call in calls.drain(..) {
                        let _ = call.done.send(Err(StoreError::batch_failed(&reason)));
                    }
                }
            }
        }
    }

    fn run(&self, db: &Database, calls: &mut [Call]) -> Result<(), BatchFailure> {
        let mut txn = db
            .begin_write()
            .map_err(|e| BatchFailure::Txn(e.into()))?;
        txn.set_durability(self.durability);

        let failed = {
            let tx = WriteTxn::open(&txn).map_err(BatchFailure::Txn)?;
            calls
                .iter_mut()
                .enumerate()
                .find_map(|(index, call)| (call.run)(&tx).err().map(|error| (index, error)))
        };

        if let Some((index, error)) = failed {
            let _ = txn.abort();
            return Err(BatchFailure::Call { index, error });
        }

        txn.commit().map_err(|e| BatchFailure::Txn(e.into()))
    }

    /// Returns the current counters.
    pub(crate) fn stats(&self) -> BatchStats {
        BatchStats {
            batches: self.batches.load(Ordering::Relaxed),
            calls: self.calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    /// Returns the number of queued calls.
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
