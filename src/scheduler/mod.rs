//! Parallel operation scheduler and executor.
//!
//! This module is the core of pkgbatch: it takes a batch of package-manager
//! operation descriptors and runs them against a bounded worker pool while
//! honoring priorities, inter-operation dependencies, and per-operation
//! timeouts.
//!
//! - **OperationQueue**: priority/dependency-aware ready-queue
//! - **WorkerPool**: bounded concurrent command execution with timeouts
//! - **ResultAggregator**: thread-safe result collection and live statistics
//! - **BatchRunner**: the driver loop binding the pieces together
//!
//! # Architecture
//!
//! ```text
//!   descriptors ──▶ OperationQueue ──ready──▶ BatchRunner ──dispatch──▶ WorkerPool
//!                                                  ▲                       │
//!                                                  │                  completions
//!                                                  └── ResultAggregator ◀──┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pkgbatch::scheduler::{BatchRunner, OperationDescriptor, OperationKind, WorkerPoolConfig};
//!
//! let mut runner = BatchRunner::new(WorkerPoolConfig::new(2));
//! runner.submit(OperationDescriptor::new(
//!     "org.mozilla.firefox",
//!     OperationKind::Update,
//!     "flatpak",
//!     vec!["flatpak".into(), "update".into(), "--noninteractive".into(), "org.mozilla.firefox".into()],
//! ))?;
//!
//! let summary = runner.run().await;
//! println!("completed {} of {}", summary.completed(), summary.total());
//! ```

pub mod aggregator;
pub mod driver;
pub mod operation;
pub mod queue;
pub mod worker_pool;

// Re-export main types for convenience
pub use aggregator::{BatchStats, BatchStatus, ResultAggregator};
pub use driver::{BatchRunner, BatchSummary, CancelFlag, ProgressCallback, StatusHandle};
pub use operation::{
    FailureKind, OperationDescriptor, OperationKind, OperationResult, SCHEDULING_FAILURE_CODE,
};
pub use queue::OperationQueue;
pub use worker_pool::{
    derived_worker_count, WorkerPool, WorkerPoolConfig, DEFAULT_OPERATION_TIMEOUT,
};
