//! The opaque generation contract.

use async_trait::async_trait;

use crate::error::QueueError;

/// Performs the actual work of a job.
///
/// Parameters are passed through untouched; the returned string is stored as
/// the job's output reference. Any `Err` (or panic) marks the job failed.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, params: &serde_json::Value) -> Result<String, QueueError>;
}
