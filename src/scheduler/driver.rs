//! Batch driver: the control loop binding queue, pool, and aggregator.
//!
//! The driver owns all scheduling bookkeeping for one batch. It is the only
//! component that touches the pending queue, which keeps ready-set
//! resolution free of races: worker tasks execute commands and return
//! results, nothing more.
//!
//! The loop alternates between refilling the pool with ready work (highest
//! priority first) and harvesting completions, until the pending queue and
//! the pool are both empty. When nothing is running and nothing can become
//! ready but work remains pending, the batch is deadlocked and terminates
//! early, reporting the stranded operations as dependency-unsatisfied.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BatchError;

use super::aggregator::{BatchStatus, ResultAggregator};
use super::operation::{OperationDescriptor, OperationResult};
use super::queue::OperationQueue;
use super::worker_pool::{WorkerPool, WorkerPoolConfig};

/// How long the driver waits on the pool before rechecking the ready set.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Callback invoked once per completed operation, successful or failed.
///
/// Runs synchronously inside the driver loop; a slow callback stalls
/// dispatch of further ready work.
pub type ProgressCallback = Box<dyn Fn(&OperationResult) + Send>;

/// Cancellation handle for a running batch.
///
/// Setting the flag stops new dispatches; operations already in flight run
/// to completion or their own timeout, and the remaining pending work is
/// reported as cancelled without being executed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cloneable, non-blocking view of a batch while it runs.
#[derive(Clone)]
pub struct StatusHandle {
    aggregator: Arc<ResultAggregator>,
}

impl StatusHandle {
    /// Returns a point-in-time status snapshot.
    pub fn status(&self) -> BatchStatus {
        self.aggregator.snapshot()
    }
}

/// Final report of one batch execution.
#[derive(Debug)]
pub struct BatchSummary {
    /// Identifier of this batch run.
    pub batch_id: Uuid,
    /// Wall-clock duration of the whole batch.
    pub total_duration: Duration,
    /// Sum of estimated durations of all submitted work divided by
    /// `total_duration`, as a percentage. Above 100 means parallelism paid off.
    pub efficiency_pct: f64,
    /// Whether the batch terminated early because pending work could never
    /// become ready.
    pub deadlocked: bool,
    /// Whether the batch was cancelled.
    pub cancelled: bool,
    /// Results of successfully completed operations.
    pub succeeded: Vec<OperationResult>,
    /// Results of failed operations, attempted or not.
    pub failed: Vec<OperationResult>,
}

impl BatchSummary {
    /// Number of successfully completed operations.
    pub fn completed(&self) -> usize {
        self.succeeded.len()
    }

    /// Number of failed operations.
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Total operations in the batch.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every operation in a non-empty batch failed.
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.succeeded.is_empty()
    }

    /// Overall batch verdict: partial success is a normal outcome; only a
    /// deadlock or a fully failed batch counts as an overall failure.
    pub fn overall_success(&self) -> bool {
        !self.deadlocked && !self.all_failed()
    }
}

/// Executes one batch of operations against a bounded worker pool.
pub struct BatchRunner {
    batch_id: Uuid,
    queue: OperationQueue,
    pool: WorkerPool,
    aggregator: Arc<ResultAggregator>,
    seen: HashSet<String>,
    estimated_total: Duration,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
}

impl BatchRunner {
    /// Creates a runner with the given pool configuration.
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            queue: OperationQueue::new(),
            pool: WorkerPool::new(config),
            aggregator: Arc::new(ResultAggregator::new()),
            seen: HashSet::new(),
            estimated_total: Duration::ZERO,
            progress: None,
            cancel: CancelFlag::default(),
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Number of operations waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Registers the progress callback.
    pub fn on_progress(mut self, callback: impl Fn(&OperationResult) + Send + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Returns the cancellation handle for this batch.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Returns a handle usable for status queries while the batch runs.
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle {
            aggregator: Arc::clone(&self.aggregator),
        }
    }

    /// Returns a point-in-time status snapshot.
    pub fn status(&self) -> BatchStatus {
        self.aggregator.snapshot()
    }

    /// Adds one descriptor to the batch.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::DuplicateOperation` if a descriptor with the
    /// same name was already submitted.
    pub fn submit(&mut self, descriptor: OperationDescriptor) -> Result<(), BatchError> {
        if !self.seen.insert(descriptor.name.clone()) {
            return Err(BatchError::DuplicateOperation(descriptor.name));
        }

        self.estimated_total += descriptor.estimated_duration();
        self.aggregator.note_submitted();
        debug!(
            operation = %descriptor.name,
            priority = descriptor.priority,
            dependencies = descriptor.dependencies.len(),
            "queued operation"
        );
        self.queue.push(descriptor);
        self.aggregator.set_queued(self.queue.len());
        Ok(())
    }

    /// Adds every descriptor from the iterator, stopping at the first error.
    pub fn submit_all(
        &mut self,
        descriptors: impl IntoIterator<Item = OperationDescriptor>,
    ) -> Result<(), BatchError> {
        for descriptor in descriptors {
            self.submit(descriptor)?;
        }
        Ok(())
    }

    /// Drives the batch to completion and returns the final summary.
    pub async fn run(mut self) -> BatchSummary {
        let started = Instant::now();
        info!(
            batch = %self.batch_id,
            operations = self.seen.len(),
            workers = self.pool.workers(),
            "starting batch"
        );

        let mut deadlocked = false;
        loop {
            if !self.cancel.is_cancelled() {
                self.refill();
            }

            if !self.pool.is_idle() {
                if let Some(result) = self.pool.next_completion(POLL_INTERVAL).await {
                    self.handle_completion(result);
                    // Pick up anything else that already finished before
                    // going back to dispatch.
                    while let Some(result) = self.pool.next_completion(Duration::ZERO).await {
                        self.handle_completion(result);
                    }
                }
                continue;
            }

            if self.queue.is_empty() {
                break;
            }

            // Nothing running, nothing dispatchable, work still pending.
            if self.cancel.is_cancelled() {
                self.drain_cancelled();
            } else {
                deadlocked = true;
                self.drain_deadlocked();
            }
            break;
        }

        self.finish(started.elapsed(), deadlocked)
    }

    /// Dispatches ready work until the pool is full or nothing is ready.
    fn refill(&mut self) {
        let completed = self.aggregator.completed_names();
        let failed = self.aggregator.failed_names();

        while self.pool.has_capacity() {
            let Some(descriptor) = self.queue.next_ready(&completed, &failed) else {
                break;
            };

            let name = descriptor.name.clone();
            let kind = descriptor.kind;
            match self.pool.dispatch(descriptor) {
                Ok(()) => {
                    self.aggregator.mark_running(name.clone(), kind);
                    self.aggregator.set_queued(self.queue.len());
                    info!(
                        operation = %name,
                        kind = %kind,
                        running = self.pool.running(),
                        "dispatched operation"
                    );
                }
                Err(refused) => {
                    self.queue.push(refused);
                    break;
                }
            }
        }
    }

    /// Records one completion and fires the progress callback.
    fn handle_completion(&mut self, result: OperationResult) {
        if result.success {
            info!(
                operation = %result.descriptor.name,
                duration_ms = result.duration.as_millis() as u64,
                "operation completed"
            );
        } else {
            warn!(
                operation = %result.descriptor.name,
                error = %result.error_text(),
                "operation failed"
            );
        }

        let for_callback = self.progress.as_ref().map(|_| result.clone());
        self.aggregator.record(result);
        if let (Some(callback), Some(result)) = (&self.progress, for_callback) {
            callback(&result);
        }
    }

    /// Reports every stranded pending operation as dependency-unsatisfied.
    fn drain_deadlocked(&mut self) {
        let completed = self.aggregator.completed_names();
        let stranded = self.queue.drain();
        self.aggregator.set_queued(0);
        warn!(
            batch = %self.batch_id,
            stranded = stranded.len(),
            "batch deadlocked: remaining operations have unsatisfiable dependencies"
        );

        for descriptor in stranded {
            let unmet: Vec<String> = descriptor
                .dependencies
                .iter()
                .filter(|dep| !completed.contains(*dep))
                .cloned()
                .collect();
            let result = OperationResult::dependency_unsatisfied(descriptor, unmet);
            self.handle_completion(result);
        }
    }

    /// Reports every remaining pending operation as cancelled.
    fn drain_cancelled(&mut self) {
        let remaining = self.queue.drain();
        self.aggregator.set_queued(0);
        info!(
            batch = %self.batch_id,
            remaining = remaining.len(),
            "batch cancelled: dropping pending operations"
        );

        for descriptor in remaining {
            let result = OperationResult::cancelled(descriptor);
            self.handle_completion(result);
        }
    }

    /// Computes final statistics and assembles the summary.
    fn finish(self, total_duration: Duration, deadlocked: bool) -> BatchSummary {
        let efficiency_pct = if total_duration.is_zero() {
            0.0
        } else {
            self.estimated_total.as_secs_f64() / total_duration.as_secs_f64() * 100.0
        };

        let stats = self.aggregator.stats();
        let (succeeded, failed) = self.aggregator.take_results();

        info!(
            batch = %self.batch_id,
            completed = stats.completed,
            failed = stats.failed,
            duration_ms = total_duration.as_millis() as u64,
            efficiency_pct = efficiency_pct as u64,
            "batch finished"
        );

        BatchSummary {
            batch_id: self.batch_id,
            total_duration,
            efficiency_pct,
            deadlocked,
            cancelled: self.cancel.is_cancelled(),
            succeeded,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::operation::OperationKind;

    fn op(name: &str, command: &[&str]) -> OperationDescriptor {
        OperationDescriptor::new(
            name,
            OperationKind::Install,
            "test",
            command.iter().map(|s| s.to_string()).collect(),
        )
        .with_estimated_secs(0.1)
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let mut runner = BatchRunner::new(WorkerPoolConfig::new(2));
        runner.submit(op("git", &["true"])).expect("first submit");

        let err = runner.submit(op("git", &["true"])).unwrap_err();
        assert!(matches!(err, BatchError::DuplicateOperation(name) if name == "git"));
        assert_eq!(runner.pending(), 1);
    }

    #[test]
    fn test_status_before_run_shows_queued() {
        let mut runner = BatchRunner::new(WorkerPoolConfig::new(2));
        runner
            .submit_all(vec![op("a", &["true"]), op("b", &["true"])])
            .expect("submit");

        let status = runner.status();
        assert_eq!(status.queued, 2);
        assert_eq!(status.running, 0);
        assert_eq!(status.completed, 0);
        assert_eq!(status.failed, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_finishes_immediately() {
        let runner = BatchRunner::new(WorkerPoolConfig::new(2));
        let summary = runner.run().await;

        assert_eq!(summary.total(), 0);
        assert!(!summary.deadlocked);
        assert!(!summary.cancelled);
        assert!(!summary.all_failed());
    }

    #[tokio::test]
    async fn test_small_batch_completes() {
        let mut runner = BatchRunner::new(WorkerPoolConfig::new(2));
        runner
            .submit_all(vec![op("a", &["true"]), op("b", &["true"])])
            .expect("submit");

        let summary = runner.run().await;

        assert_eq!(summary.completed(), 2);
        assert_eq!(summary.failed_count(), 0);
        assert!(summary.overall_success());
    }
}
