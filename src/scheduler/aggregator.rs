//! Thread-safe aggregation of operation results and live statistics.
//!
//! The aggregator owns the running/completed/failed bookkeeping for one
//! batch. `record` may be called from any number of completion paths
//! concurrently; `snapshot` produces a consistent point-in-time view
//! without blocking recording for longer than the copy takes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::operation::{OperationKind, OperationResult};

/// Point-in-time view of a batch, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStatus {
    /// Descriptors not yet dispatched.
    pub queued: usize,
    /// Descriptors currently executing.
    pub running: usize,
    /// Descriptors that finished successfully.
    pub completed: usize,
    /// Descriptors that finished unsuccessfully.
    pub failed: usize,
    /// Name and kind of each currently running operation, in dispatch order.
    pub running_operations: Vec<(String, OperationKind)>,
}

/// Running statistics counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    /// Total descriptors submitted to the batch.
    pub submitted: usize,
    /// Operations that finished successfully.
    pub completed: usize,
    /// Operations that finished unsuccessfully.
    pub failed: usize,
    /// Sum of observed per-operation durations.
    pub cumulative_duration: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    running: Vec<(String, OperationKind)>,
    completed: HashSet<String>,
    failed: HashSet<String>,
    succeeded_results: Vec<OperationResult>,
    failed_results: Vec<OperationResult>,
}

/// Collects completions and keeps the batch's shared mutable state.
///
/// Sets and result lists live behind one mutex so a recorded result and
/// its set transition are observed atomically; the counters that feed
/// statistics are plain atomics in the same style as the pool stats.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    inner: Mutex<Inner>,
    queued: AtomicUsize,
    submitted: AtomicUsize,
    total_duration_ms: AtomicU64,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the submitted counter; called once per accepted descriptor.
    pub fn note_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Publishes the current pending-queue depth for status snapshots.
    pub fn set_queued(&self, queued: usize) {
        self.queued.store(queued, Ordering::SeqCst);
    }

    /// Marks an operation as running; called by the driver at dispatch.
    pub fn mark_running(&self, name: impl Into<String>, kind: OperationKind) {
        let mut inner = self.inner.lock().expect("lock not poisoned");
        inner.running.push((name.into(), kind));
    }

    /// Records a completion, moving the operation's name from running into
    /// completed or failed and appending the result.
    ///
    /// Safe to call concurrently; the set transition and the result append
    /// happen under one lock acquisition.
    pub fn record(&self, result: OperationResult) {
        self.total_duration_ms
            .fetch_add(result.duration.as_millis() as u64, Ordering::SeqCst);

        let mut inner = self.inner.lock().expect("lock not poisoned");
        let name = result.descriptor.name.clone();
        inner.running.retain(|(running, _)| *running != name);
        if result.success {
            inner.completed.insert(name);
            inner.succeeded_results.push(result);
        } else {
            inner.failed.insert(name);
            inner.failed_results.push(result);
        }
    }

    /// Returns a consistent point-in-time status copy.
    pub fn snapshot(&self) -> BatchStatus {
        let inner = self.inner.lock().expect("lock not poisoned");
        BatchStatus {
            queued: self.queued.load(Ordering::SeqCst),
            running: inner.running.len(),
            completed: inner.completed.len(),
            failed: inner.failed.len(),
            running_operations: inner.running.clone(),
        }
    }

    /// Returns the statistics counters.
    pub fn stats(&self) -> BatchStats {
        let inner = self.inner.lock().expect("lock not poisoned");
        BatchStats {
            submitted: self.submitted.load(Ordering::SeqCst),
            completed: inner.completed.len(),
            failed: inner.failed.len(),
            cumulative_duration: Duration::from_millis(
                self.total_duration_ms.load(Ordering::SeqCst),
            ),
        }
    }

    /// Clones the names of successfully completed operations.
    pub fn completed_names(&self) -> HashSet<String> {
        self.inner
            .lock()
            .expect("lock not poisoned")
            .completed
            .clone()
    }

    /// Clones the names of failed operations.
    pub fn failed_names(&self) -> HashSet<String> {
        self.inner.lock().expect("lock not poisoned").failed.clone()
    }

    /// Hands the accumulated results to the caller, successful then failed.
    ///
    /// Leaves the aggregator empty; called once at batch completion.
    pub fn take_results(&self) -> (Vec<OperationResult>, Vec<OperationResult>) {
        let mut inner = self.inner.lock().expect("lock not poisoned");
        (
            std::mem::take(&mut inner.succeeded_results),
            std::mem::take(&mut inner.failed_results),
        )
    }
}
