//! Append-only execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{Job, JobStatus};

/// Audit entry written once when a job reaches a terminal run outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub job_id: String,
    pub status: JobStatus,
    pub duration_ms: i64,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Record the final state of `job`.
    pub fn for_job(job: &Job) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            status: job.status,
            duration_ms: job.duration_ms().unwrap_or(0),
            recorded_at: Utc::now(),
        }
    }
}
