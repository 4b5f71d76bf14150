//! Queue errors.

use genflow_store::StoreError;
use thiserror::Error;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The generation contract raised.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Worker error.
    #[error("Worker error: {0}")]
    WorkerError(String),
}
