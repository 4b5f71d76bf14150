//! Store errors.

use thiserror::Error;

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Record (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
