//! Error types for pkgbatch operations.
//!
//! Only batch assembly and configuration loading have error paths.
//! Failures of individual operations are data, not errors: every failing
//! execution path is converted to a failed `OperationResult` at its point
//! of origin and never unwinds into the driver loop.

use thiserror::Error;

/// Errors that can occur while assembling a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A descriptor with this name was already submitted to the batch.
    #[error("operation '{0}' is already part of this batch")]
    DuplicateOperation(String),
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
