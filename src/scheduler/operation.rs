//! Operation descriptors and results.
//!
//! This module defines the value types flowing through the scheduler:
//!
//! - `OperationDescriptor`: one immutable unit of package-manager work
//! - `OperationKind`: install / update / remove
//! - `OperationResult`: the outcome of a single executed (or abandoned) operation
//! - `FailureKind`: why a failed operation failed

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exit code recorded when an operation never produced a real process exit
/// status: timeout, launch failure, unsatisfied dependencies, cancellation.
pub const SCHEDULING_FAILURE_CODE: i32 = -1;

/// Estimated duration assigned to descriptors that do not specify one.
const DEFAULT_ESTIMATED_SECS: f64 = 30.0;

fn default_estimated_secs() -> f64 {
    DEFAULT_ESTIMATED_SECS
}

/// The kind of package-manager operation a descriptor performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Install,
    Update,
    Remove,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Install => write!(f, "install"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Remove => write!(f, "remove"),
        }
    }
}

/// A single unit of package-manager work.
///
/// Descriptors are constructed fully formed before being handed to the
/// scheduler and are never mutated afterwards; adjusting one means
/// submitting a new descriptor in a new batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Identifier, unique within a batch (the package or batch-group name).
    pub name: String,
    /// What the operation does.
    pub kind: OperationKind,
    /// Tag of the package manager this operation targets ("flatpak", "pacman", ...).
    pub manager: String,
    /// Literal argv to execute; the first element is the program.
    pub command: Vec<String>,
    /// Higher priority is dispatched first.
    #[serde(default)]
    pub priority: i32,
    /// Names of operations in the same batch that must complete
    /// successfully before this one becomes ready.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Estimated duration in seconds. Used only for efficiency reporting,
    /// never for correctness.
    #[serde(default = "default_estimated_secs")]
    pub estimated_secs: f64,
}

impl OperationDescriptor {
    /// Creates a descriptor with default priority, no dependencies, and the
    /// default duration estimate.
    pub fn new(
        name: impl Into<String>,
        kind: OperationKind,
        manager: impl Into<String>,
        command: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            manager: manager.into(),
            command,
            priority: 0,
            dependencies: Vec::new(),
            estimated_secs: DEFAULT_ESTIMATED_SECS,
        }
    }

    /// Sets the scheduling priority (higher runs first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the dependency list.
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Sets the estimated duration in seconds.
    pub fn with_estimated_secs(mut self, secs: f64) -> Self {
        self.estimated_secs = secs;
        self
    }

    /// The duration estimate as a `Duration`.
    pub fn estimated_duration(&self) -> Duration {
        Duration::from_secs_f64(self.estimated_secs.max(0.0))
    }
}

/// Why a failed operation failed.
///
/// Distinguishes "the package's command failed" from "the operation was
/// never attempted", so callers can report the two differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum FailureKind {
    /// The process ran to completion and exited non-zero.
    CommandFailed,
    /// The process exceeded the per-operation timeout and was terminated.
    Timeout,
    /// The command could not be started at all.
    LaunchFailed { reason: String },
    /// The operation could never become ready: a dependency failed, was
    /// never attempted, or formed a cycle. The command was not executed.
    DependencyUnsatisfied { dependencies: Vec<String> },
    /// The batch was cancelled before the operation was dispatched.
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::CommandFailed => write!(f, "command exited non-zero"),
            FailureKind::Timeout => write!(f, "operation timed out"),
            FailureKind::LaunchFailed { reason } => write!(f, "failed to launch: {reason}"),
            FailureKind::DependencyUnsatisfied { dependencies } => {
                write!(f, "unsatisfied dependencies: {}", dependencies.join(", "))
            }
            FailureKind::Cancelled => write!(f, "batch cancelled before dispatch"),
        }
    }
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// The descriptor this result originated from.
    pub descriptor: OperationDescriptor,
    /// Whether the operation completed successfully.
    pub success: bool,
    /// Observed wall-clock duration.
    pub duration: Duration,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code, or [`SCHEDULING_FAILURE_CODE`] when no real exit
    /// status exists.
    pub exit_code: i32,
    /// Failure classification; `None` on success.
    pub failure: Option<FailureKind>,
    /// When the result was produced.
    pub completed_at: DateTime<Utc>,
}

impl OperationResult {
    /// Creates a successful result.
    pub fn success(
        descriptor: OperationDescriptor,
        duration: Duration,
        stdout: String,
        stderr: String,
        exit_code: i32,
    ) -> Self {
        Self {
            descriptor,
            success: true,
            duration,
            stdout,
            stderr,
            exit_code,
            failure: None,
            completed_at: Utc::now(),
        }
    }

    /// Creates a result for a process that ran and exited non-zero.
    pub fn command_failure(
        descriptor: OperationDescriptor,
        duration: Duration,
        stdout: String,
        stderr: String,
        exit_code: i32,
    ) -> Self {
        Self {
            descriptor,
            success: false,
            duration,
            stdout,
            stderr,
            exit_code,
            failure: Some(FailureKind::CommandFailed),
            completed_at: Utc::now(),
        }
    }

    /// Creates a result for a terminated, timed-out operation.
    pub fn timeout(descriptor: OperationDescriptor, duration: Duration) -> Self {
        Self {
            descriptor,
            success: false,
            duration,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: SCHEDULING_FAILURE_CODE,
            failure: Some(FailureKind::Timeout),
            completed_at: Utc::now(),
        }
    }

    /// Creates a result for a command that could not be started.
    pub fn launch_failure(
        descriptor: OperationDescriptor,
        duration: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            success: false,
            duration,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: SCHEDULING_FAILURE_CODE,
            failure: Some(FailureKind::LaunchFailed {
                reason: reason.into(),
            }),
            completed_at: Utc::now(),
        }
    }

    /// Creates a result for an operation that could never become ready.
    pub fn dependency_unsatisfied(
        descriptor: OperationDescriptor,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            descriptor,
            success: false,
            duration: Duration::ZERO,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: SCHEDULING_FAILURE_CODE,
            failure: Some(FailureKind::DependencyUnsatisfied { dependencies }),
            completed_at: Utc::now(),
        }
    }

    /// Creates a result for an operation dropped by batch cancellation.
    pub fn cancelled(descriptor: OperationDescriptor) -> Self {
        Self {
            descriptor,
            success: false,
            duration: Duration::ZERO,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: SCHEDULING_FAILURE_CODE,
            failure: Some(FailureKind::Cancelled),
            completed_at: Utc::now(),
        }
    }

    /// Whether the operation was never attempted (as opposed to attempted
    /// and failed).
    pub fn was_attempted(&self) -> bool {
        !matches!(
            self.failure,
            Some(FailureKind::DependencyUnsatisfied { .. }) | Some(FailureKind::Cancelled)
        )
    }

    /// Human-readable failure text for summaries; empty on success.
    pub fn error_text(&self) -> String {
        match &self.failure {
            None => String::new(),
            Some(FailureKind::CommandFailed) if !self.stderr.trim().is_empty() => {
                format!("exit code {}: {}", self.exit_code, self.stderr.trim())
            }
            Some(FailureKind::CommandFailed) => format!("exit code {}", self.exit_code),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> OperationDescriptor {
        OperationDescriptor::new(
            name,
            OperationKind::Install,
            "pacman",
            vec!["true".to_string()],
        )
    }

    #[test]
    fn test_descriptor_defaults() {
        let op = descriptor("git");

        assert_eq!(op.name, "git");
        assert_eq!(op.kind, OperationKind::Install);
        assert_eq!(op.manager, "pacman");
        assert_eq!(op.priority, 0);
        assert!(op.dependencies.is_empty());
        assert_eq!(op.estimated_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_descriptor_builder() {
        let op = descriptor("htop")
            .with_priority(50)
            .with_dependencies(vec!["git".to_string()])
            .with_estimated_secs(12.5);

        assert_eq!(op.priority, 50);
        assert_eq!(op.dependencies, vec!["git".to_string()]);
        assert_eq!(op.estimated_duration(), Duration::from_secs_f64(12.5));
    }

    #[test]
    fn test_negative_estimate_clamps_to_zero() {
        let op = descriptor("curl").with_estimated_secs(-3.0);
        assert_eq!(op.estimated_duration(), Duration::ZERO);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(OperationKind::Install.to_string(), "install");
        assert_eq!(OperationKind::Update.to_string(), "update");
        assert_eq!(OperationKind::Remove.to_string(), "remove");
    }

    #[test]
    fn test_descriptor_deserializes_with_defaults() {
        let json = r#"{
            "name": "org.gimp.GIMP",
            "kind": "update",
            "manager": "flatpak",
            "command": ["flatpak", "update", "--noninteractive", "org.gimp.GIMP"]
        }"#;

        let op: OperationDescriptor = serde_json::from_str(json).expect("descriptor should parse");

        assert_eq!(op.kind, OperationKind::Update);
        assert_eq!(op.priority, 0);
        assert!(op.dependencies.is_empty());
        assert_eq!(op.estimated_secs, 30.0);
    }

    #[test]
    fn test_success_result() {
        let result = OperationResult::success(
            descriptor("git"),
            Duration::from_secs(2),
            "installed".to_string(),
            String::new(),
            0,
        );

        assert!(result.success);
        assert!(result.failure.is_none());
        assert!(result.was_attempted());
        assert_eq!(result.exit_code, 0);
        assert!(result.error_text().is_empty());
    }

    #[test]
    fn test_command_failure_error_text_includes_stderr() {
        let result = OperationResult::command_failure(
            descriptor("git"),
            Duration::from_secs(1),
            String::new(),
            "target not found: git\n".to_string(),
            1,
        );

        assert!(!result.success);
        assert!(result.was_attempted());
        assert_eq!(result.error_text(), "exit code 1: target not found: git");
    }

    #[test]
    fn test_timeout_uses_sentinel_exit_code() {
        let result = OperationResult::timeout(descriptor("git"), Duration::from_secs(300));

        assert!(!result.success);
        assert_eq!(result.exit_code, SCHEDULING_FAILURE_CODE);
        assert_eq!(result.failure, Some(FailureKind::Timeout));
    }

    #[test]
    fn test_dependency_unsatisfied_was_never_attempted() {
        let result = OperationResult::dependency_unsatisfied(
            descriptor("htop"),
            vec!["git".to_string(), "curl".to_string()],
        );

        assert!(!result.success);
        assert!(!result.was_attempted());
        assert_eq!(result.duration, Duration::ZERO);
        assert_eq!(result.error_text(), "unsatisfied dependencies: git, curl");
    }

    #[test]
    fn test_result_serialization_round_trip() {
        let result = OperationResult::launch_failure(
            descriptor("git"),
            Duration::from_millis(5),
            "No such file or directory",
        );

        let json = serde_json::to_string(&result).expect("serialization should work");
        let parsed: OperationResult = serde_json::from_str(&json).expect("parse should work");

        assert_eq!(parsed, result);
    }
}
