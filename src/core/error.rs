//! Error types for Sobelgrid.
//!
//! Uses thiserror for structured errors with context. Every error is
//! terminal for a run: the pipeline is an offline batch transform with no
//! supervisor to retry against, so errors are propagated to the caller
//! instead of terminating the process.

use thiserror::Error;

/// Top-level error type for Sobelgrid.
#[derive(Error, Debug)]
pub enum SobelError {
    /// A buffer could not be allocated (or its size overflowed `usize`).
    #[error("Memory allocation failed: could not reserve {bytes} bytes")]
    AllocationFailure { bytes: usize },

    /// The input container header was not recognized.
    #[error("Unsupported image format: unrecognized header {magic:?}")]
    UnsupportedFormat { magic: String },

    /// The worker count is incompatible with the image height.
    #[error("Invalid topology: {workers} worker(s) for image height {height}: {reason}")]
    InvalidTopology {
        workers: usize,
        height: u32,
        reason: String,
    },

    /// Gathering produced fewer partitions than expected, or an invalid set.
    #[error("Incomplete partition set: expected {expected}, received {received}: {reason}")]
    IncompletePartitionSet {
        expected: usize,
        received: usize,
        reason: String,
    },

    /// A sample buffer does not match its declared shape.
    #[error("Shape mismatch: expected {expected} samples, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The intra-worker thread pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// A worker link closed in the middle of a collective operation.
    #[error("Communication error on rank {rank}: {reason}")]
    Communication { rank: usize, reason: String },

    /// A worker reported a failure while computing its partition.
    #[error("Worker {rank} failed ({kind}): {reason}")]
    WorkerFailed {
        rank: usize,
        kind: String,
        reason: String,
    },

    /// A worker thread panicked.
    #[error("Worker {rank} panicked")]
    WorkerPanicked { rank: usize },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl SobelError {
    /// Every error aborts the whole run; there is no degraded output mode.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Stable short name of the error category, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SobelError::AllocationFailure { .. } => "allocation_failure",
            SobelError::UnsupportedFormat { .. } => "unsupported_format",
            SobelError::InvalidTopology { .. } => "invalid_topology",
            SobelError::IncompletePartitionSet { .. } => "incomplete_partition_set",
            SobelError::ShapeMismatch { .. } => "shape_mismatch",
            SobelError::WorkerPool(_) => "worker_pool",
            SobelError::Communication { .. } => "communication",
            SobelError::WorkerFailed { .. } => "worker_failed",
            SobelError::WorkerPanicked { .. } => "worker_panicked",
            SobelError::Config(_) => "config",
            SobelError::Io(_) => "io",
            SobelError::Image(_) => "image",
        }
    }

    /// Shorthand for a [`SobelError::InvalidTopology`].
    pub(crate) fn topology(workers: usize, height: u32, reason: impl Into<String>) -> Self {
        SobelError::InvalidTopology {
            workers,
            height,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`SobelError::IncompletePartitionSet`].
    pub(crate) fn incomplete(expected: usize, received: usize, reason: impl Into<String>) -> Self {
        SobelError::IncompletePartitionSet {
            expected,
            received,
            reason: reason.into(),
        }
    }
}

/// Result type alias for Sobelgrid operations.
pub type SobelResult<T> = Result<T, SobelError>;
