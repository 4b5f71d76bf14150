//! Store trait and in-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::definition::ScheduleDefinition;
use crate::error::StoreError;
use crate::history::ExecutionRecord;
use crate::job::{Job, JobStatus};

/// Durable keyed storage for jobs, definitions and history.
///
/// Every write is visible to subsequent reads once the future resolves.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job.
    async fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Load a job by ID.
    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Jobs with the given status, in enqueue order.
    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    /// Queued jobs in dispatch order: priority descending, then enqueue order.
    async fn queued_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Highest enqueue sequence number ever stored (0 when empty).
    async fn max_sequence(&self) -> Result<u64, StoreError>;

    /// Insert or replace a schedule definition.
    async fn save_definition(&self, definition: &ScheduleDefinition) -> Result<(), StoreError>;

    /// Load a schedule definition by ID.
    async fn get_definition(&self, id: &str) -> Result<Option<ScheduleDefinition>, StoreError>;

    /// All schedule definitions, oldest first.
    async fn list_definitions(&self) -> Result<Vec<ScheduleDefinition>, StoreError>;

    /// Delete a schedule definition. Returns whether it existed.
    async fn delete_definition(&self, id: &str) -> Result<bool, StoreError>;

    /// Append an execution history record.
    async fn append_history(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// History records, oldest first, optionally for a single job.
    async fn history(&self, job_id: Option<&str>) -> Result<Vec<ExecutionRecord>, StoreError>;

    /// History records recorded at or after `since`, oldest first.
    async fn history_since(&self, since: DateTime<Utc>) -> Result<Vec<ExecutionRecord>, StoreError>;
}

/// In-memory store for tests and ephemeral runs.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
    definitions: RwLock<HashMap<String, ScheduleDefinition>>,
    history: RwLock<Vec<ExecutionRecord>>,
}

impl MemoryJobStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            definitions: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs.values().filter(|j| j.status == status).cloned().collect();
        matching.sort_by_key(|j| j.seq);
        Ok(matching)
    }

    async fn queued_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let mut queued = self.jobs_with_status(JobStatus::Queued).await?;
        queued.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.seq.cmp(&b.seq)));
        Ok(queued)
    }

    async fn max_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.jobs.read().await.values().map(|j| j.seq).max().unwrap_or(0))
    }

    async fn save_definition(&self, definition: &ScheduleDefinition) -> Result<(), StoreError> {
        self.definitions
            .write()
            .await
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn get_definition(&self, id: &str) -> Result<Option<ScheduleDefinition>, StoreError> {
        Ok(self.definitions.read().await.get(id).cloned())
    }

    async fn list_definitions(&self) -> Result<Vec<ScheduleDefinition>, StoreError> {
        let mut definitions: Vec<ScheduleDefinition> =
            self.definitions.read().await.values().cloned().collect();
        definitions.sort_by_key(|d| d.created_at);
        Ok(definitions)
    }

    async fn delete_definition(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.definitions.write().await.remove(id).is_some())
    }

    async fn append_history(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.history.write().await.push(record.clone());
        Ok(())
    }

    async fn history(&self, job_id: Option<&str>) -> Result<Vec<ExecutionRecord>, StoreError> {
        let history = self.history.read().await;
        Ok(history
            .iter()
            .filter(|r| job_id.is_none_or(|id| r.job_id == id))
            .cloned()
            .collect())
    }

    async fn history_since(&self, since: DateTime<Utc>) -> Result<Vec<ExecutionRecord>, StoreError> {
        let history = self.history.read().await;
        Ok(history.iter().filter(|r| r.recorded_at >= since).cloned().collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
