//! Bounded worker pool that executes operation commands.
//!
//! The pool runs at most `workers` operations concurrently. Each dispatched
//! operation spawns the descriptor's command as a child process, captures
//! stdout/stderr, and is killed if it exceeds the per-operation timeout.
//! Every execution path, including spawn failure and timeout, yields an
//! `OperationResult`; nothing escapes as an error or panic.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::operation::{OperationDescriptor, OperationResult, SCHEDULING_FAILURE_CODE};

/// Hard per-operation ceiling unless configuration overrides it.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Derives a worker count from the detected CPU core count.
///
/// Package operations are I/O heavy and can stress the whole system, so
/// the pool stays well below the core count.
pub fn derived_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    worker_count_for_cores(cores)
}

fn worker_count_for_cores(cores: usize) -> usize {
    if cores >= 8 {
        4
    } else if cores >= 4 {
        3
    } else if cores >= 2 {
        2
    } else {
        1
    }
}

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Maximum number of concurrently executing operations.
    pub workers: usize,
    /// Wall-clock ceiling for a single operation.
    pub operation_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: derived_worker_count(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl WorkerPoolConfig {
    /// Creates a configuration with the specified number of workers.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the per-operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Bounded pool of concurrently executing operations.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    inflight: JoinSet<OperationResult>,
    descriptors: HashMap<tokio::task::Id, OperationDescriptor>,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            config,
            inflight: JoinSet::new(),
            descriptors: HashMap::new(),
        }
    }

    /// The configured concurrency limit.
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Number of operations currently executing.
    pub fn running(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.inflight.is_empty()
    }

    /// Whether a worker slot is free.
    pub fn has_capacity(&self) -> bool {
        self.inflight.len() < self.config.workers
    }

    /// Dispatches one descriptor for asynchronous execution.
    ///
    /// Refused when every worker slot is taken; the descriptor is handed
    /// back so the caller can requeue it.
    pub fn dispatch(&mut self, descriptor: OperationDescriptor) -> Result<(), OperationDescriptor> {
        if !self.has_capacity() {
            return Err(descriptor);
        }

        let timeout = self.config.operation_timeout;
        let task = descriptor.clone();
        let handle = self
            .inflight
            .spawn(async move { execute_operation(task, timeout).await });
        self.descriptors.insert(handle.id(), descriptor);
        Ok(())
    }

    /// Waits up to `wait` for the next completion.
    ///
    /// Returns `None` when the pool is idle or nothing finished within the
    /// window. A worker that dies without producing a result (a panic in
    /// the execution path) is converted to a failed result rather than
    /// surfaced as an error.
    pub async fn next_completion(&mut self, wait: Duration) -> Option<OperationResult> {
        if self.inflight.is_empty() {
            return None;
        }

        match tokio::time::timeout(wait, self.inflight.join_next_with_id()).await {
            Ok(Some(Ok((id, result)))) => {
                self.descriptors.remove(&id);
                Some(result)
            }
            Ok(Some(Err(join_error))) => {
                warn!(error = %join_error, "worker task died without a result");
                self.descriptors.remove(&join_error.id()).map(|descriptor| {
                    OperationResult::launch_failure(
                        descriptor,
                        Duration::ZERO,
                        format!("worker task failed: {join_error}"),
                    )
                })
            }
            Ok(None) | Err(_) => None,
        }
    }
}

/// Runs one operation command to completion or timeout.
///
/// Converts every failure mode into an `OperationResult` at the point of
/// origin: spawn errors become launch failures, an elapsed timeout kills
/// the child (`kill_on_drop`) and becomes a timeout failure.
async fn execute_operation(descriptor: OperationDescriptor, timeout: Duration) -> OperationResult {
    let started = Instant::now();

    let (program, args) = match descriptor.command.split_first() {
        Some((program, args)) => (program.clone(), args.to_vec()),
        None => {
            return OperationResult::launch_failure(descriptor, Duration::ZERO, "empty command")
        }
    };

    debug!(operation = %descriptor.name, program = %program, "starting operation command");

    let mut command = Command::new(&program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            return OperationResult::launch_failure(
                descriptor,
                started.elapsed(),
                format!("failed to spawn {program}: {error}"),
            )
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let duration = started.elapsed();
            let exit_code = output.status.code().unwrap_or(SCHEDULING_FAILURE_CODE);
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

            if output.status.success() {
                OperationResult::success(descriptor, duration, stdout, stderr, exit_code)
            } else {
                OperationResult::command_failure(descriptor, duration, stdout, stderr, exit_code)
            }
        }
        Ok(Err(error)) => OperationResult::launch_failure(
            descriptor,
            started.elapsed(),
            format!("process error: {error}"),
        ),
        // Dropping the wait future kills the child via kill_on_drop.
        Err(_) => OperationResult::timeout(descriptor, started.elapsed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::operation::{FailureKind, OperationKind};

    fn sh_op(name: &str, command: &[&str]) -> OperationDescriptor {
        OperationDescriptor::new(
            name,
            OperationKind::Install,
            "test",
            command.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_worker_count_clamp() {
        assert_eq!(worker_count_for_cores(1), 1);
        assert_eq!(worker_count_for_cores(2), 2);
        assert_eq!(worker_count_for_cores(3), 2);
        assert_eq!(worker_count_for_cores(4), 3);
        assert_eq!(worker_count_for_cores(7), 3);
        assert_eq!(worker_count_for_cores(8), 4);
        assert_eq!(worker_count_for_cores(64), 4);
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerPoolConfig::new(2).with_operation_timeout(Duration::from_secs(10));

        assert_eq!(config.workers, 2);
        assert_eq!(config.operation_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_default_timeout() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.operation_timeout, Duration::from_secs(300));
        assert!(config.workers >= 1);
        assert!(config.workers <= 4);
    }

    #[tokio::test]
    async fn test_dispatch_refused_at_capacity() {
        let mut pool = WorkerPool::new(WorkerPoolConfig::new(1));

        assert!(pool.dispatch(sh_op("first", &["sleep", "5"])).is_ok());
        assert!(!pool.has_capacity());

        let refused = pool.dispatch(sh_op("second", &["true"]));
        assert_eq!(refused.unwrap_err().name, "second");
        assert_eq!(pool.running(), 1);
    }

    #[tokio::test]
    async fn test_successful_command_captures_stdout() {
        let result =
            execute_operation(sh_op("echo", &["echo", "hello"]), Duration::from_secs(5)).await;

        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_command_failure() {
        let result = execute_operation(sh_op("fail", &["false"]), Duration::from_secs(5)).await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::CommandFailed));
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_failure() {
        let result = execute_operation(
            sh_op("ghost", &["pkgbatch-no-such-binary-xyz"]),
            Duration::from_secs(5),
        )
        .await;

        assert!(!result.success);
        assert!(matches!(
            result.failure,
            Some(FailureKind::LaunchFailed { .. })
        ));
        assert_eq!(result.exit_code, SCHEDULING_FAILURE_CODE);
    }

    #[tokio::test]
    async fn test_empty_command_is_launch_failure() {
        let result = execute_operation(sh_op("empty", &[]), Duration::from_secs(5)).await;

        assert!(!result.success);
        assert!(matches!(
            result.failure,
            Some(FailureKind::LaunchFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_terminates_operation() {
        let started = std::time::Instant::now();
        let result =
            execute_operation(sh_op("slow", &["sleep", "30"]), Duration::from_millis(200)).await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(result.exit_code, SCHEDULING_FAILURE_CODE);
        // Terminated within a bounded margin of the timeout, not after 30s.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_pool_harvests_completions() {
        let mut pool = WorkerPool::new(WorkerPoolConfig::new(2));
        pool.dispatch(sh_op("a", &["true"])).expect("capacity");
        pool.dispatch(sh_op("b", &["true"])).expect("capacity");

        let mut harvested = Vec::new();
        while harvested.len() < 2 {
            if let Some(result) = pool.next_completion(Duration::from_millis(500)).await {
                harvested.push(result.descriptor.name.clone());
            }
        }

        harvested.sort();
        assert_eq!(harvested, vec!["a", "b"]);
        assert!(pool.is_idle());
        assert!(pool
            .next_completion(Duration::from_millis(10))
            .await
            .is_none());
    }
}
