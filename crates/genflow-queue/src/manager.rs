//! Queue manager: admission, cancellation, claiming and completion of jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use serde::Serialize;
use tokio::sync::{Mutex, Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use genflow_store::{ExecutionRecord, Job, JobSpec, JobStatus, JobStore};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::event::{EventBus, HandlerResult, QueueEvent, QueueEventKind};
use crate::generator::Generator;
use crate::worker::WorkerPool;

/// Error recorded on jobs found running after a restart.
pub const INTERRUPTED_ERROR: &str = "interrupted by process restart";

/// Per-status job counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

/// Read-only view of the queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub stats: QueueStats,
    /// Queued jobs in dispatch order.
    pub queued: Vec<Job>,
    /// Running jobs in start order.
    pub running: Vec<Job>,
}

/// Accepts jobs, hands them to worker slots and records their outcome.
///
/// The store is the only authority: every transition is written through
/// before it is announced.
pub struct QueueManager {
    config: QueueConfig,
    store: Arc<dyn JobStore>,
    pub(crate) generator: Arc<dyn Generator>,
    events: EventBus,
    sequence: AtomicU64,
    /// Serializes transitions that touch queue positions.
    admission: Mutex<()>,
    pub(crate) wakeup: Notify,
    waiters: SyncMutex<HashMap<String, Vec<oneshot::Sender<Job>>>>,
    pool: Arc<WorkerPool>,
}

impl QueueManager {
    /// Create a manager, resuming the enqueue sequence from the store.
    pub async fn new(
        store: Arc<dyn JobStore>,
        generator: Arc<dyn Generator>,
        config: QueueConfig,
    ) -> Result<Self, QueueError> {
        let sequence = store.max_sequence().await?;
        let pool = Arc::new(WorkerPool::new(config.clone()));
        Ok(Self {
            config,
            store,
            generator,
            events: EventBus::new(),
            sequence: AtomicU64::new(sequence),
            admission: Mutex::new(()),
            wakeup: Notify::new(),
            waiters: SyncMutex::new(HashMap::new()),
            pool,
        })
    }

    /// Queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Register an event handler.
    pub fn on<F, R>(&self, kind: QueueEventKind, handler: F)
    where
        F: Fn(&QueueEvent) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        self.events.on(kind, handler);
    }

    /// Worker pool driven by [`start`](Self::start).
    pub fn worker_pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Spawn the worker pool. It runs until `shutdown` flips to `true`.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.pool.clone().run_loop(self.clone(), shutdown))
    }

    /// Store a new queued job and return its id.
    pub async fn enqueue(&self, spec: JobSpec) -> Result<String, QueueError> {
        let job = {
            let _guard = self.admission.lock().await;
            let queued = self.store.jobs_with_status(JobStatus::Queued).await?.len() as u32;
            let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let job = Job::from_spec(spec, seq, queued + 1);
            self.store.save_job(&job).await?;
            job
        };

        info!(
            job_id = %job.id,
            name = %job.name,
            priority = ?job.priority,
            position = ?job.queue_position,
            "job queued"
        );
        let id = job.id.clone();
        self.events.emit(&QueueEvent::new(QueueEventKind::JobQueued, job)).await;
        self.wakeup.notify_one();
        Ok(id)
    }

    /// Cancel a queued job. Returns `false` for any other status or an
    /// unknown id.
    pub async fn cancel(&self, job_id: &str) -> Result<bool, QueueError> {
        let job = {
            let _guard = self.admission.lock().await;
            let Some(mut job) = self.store.get_job(job_id).await? else {
                return Ok(false);
            };
            if job.status != JobStatus::Queued {
                debug!(job_id, status = %job.status, "cancel ignored");
                return Ok(false);
            }

            let removed = job.queue_position.take();
            job.status = JobStatus::Cancelled;
            job.ended_at = Some(Utc::now());
            self.store.save_job(&job).await?;
            if let Some(position) = removed {
                self.compact_after(position).await?;
            }
            job
        };

        info!(job_id = %job.id, "job cancelled");
        self.resolve_waiters(&job);
        self.events.emit(&QueueEvent::new(QueueEventKind::JobCancelled, job)).await;
        Ok(true)
    }

    /// Load a job by id.
    pub async fn get_task(&self, job_id: &str) -> Result<Option<Job>, QueueError> {
        Ok(self.store.get_job(job_id).await?)
    }

    /// Counts per status plus the queued and running lists.
    pub async fn get_queue_snapshot(&self) -> Result<QueueSnapshot, QueueError> {
        let queued = self.store.queued_jobs().await?;
        let running = self.store.jobs_with_status(JobStatus::Running).await?;
        let completed = self.store.jobs_with_status(JobStatus::Completed).await?.len();
        let failed = self.store.jobs_with_status(JobStatus::Failed).await?.len();
        let cancelled = self.store.jobs_with_status(JobStatus::Cancelled).await?.len();

        let stats = QueueStats {
            queued: queued.len(),
            running: running.len(),
            completed,
            failed,
            cancelled,
            total: queued.len() + running.len() + completed + failed + cancelled,
        };
        Ok(QueueSnapshot {
            stats,
            queued,
            running,
        })
    }

    /// Execution history, optionally for a single job.
    pub async fn history(&self, job_id: Option<&str>) -> Result<Vec<ExecutionRecord>, QueueError> {
        Ok(self.store.history(job_id).await?)
    }

    /// Resolve once the job reaches a terminal status.
    pub async fn wait_for(&self, job_id: &str) -> Result<Job, QueueError> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().entry(job_id.to_string()).or_default().push(tx);

        // Registered first so a completion racing with this lookup is not lost.
        match self.store.get_job(job_id).await? {
            None => {
                self.waiters.lock().remove(job_id);
                return Err(QueueError::JobNotFound(job_id.to_string()));
            }
            Some(job) if job.status.is_terminal() => {
                self.waiters.lock().remove(job_id);
                return Ok(job);
            }
            Some(_) => {}
        }

        rx.await
            .map_err(|_| QueueError::WorkerError(format!("waiter for job {} dropped", job_id)))
    }

    /// Fail jobs left running by a previous process and re-number the queue.
    ///
    /// Interrupted jobs are not retried.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let _guard = self.admission.lock().await;

        let interrupted = self.store.jobs_with_status(JobStatus::Running).await?;
        let count = interrupted.len();
        for mut job in interrupted {
            job.status = JobStatus::Failed;
            job.error = Some(INTERRUPTED_ERROR.to_string());
            job.ended_at = Some(Utc::now());
            self.store.save_job(&job).await?;
            self.store.append_history(&ExecutionRecord::for_job(&job)).await?;
            warn!(job_id = %job.id, name = %job.name, "job interrupted by restart marked failed");
        }

        let queued = self.store.jobs_with_status(JobStatus::Queued).await?;
        for (index, mut job) in queued.into_iter().enumerate() {
            let position = Some(index as u32 + 1);
            if job.queue_position != position {
                job.queue_position = position;
                self.store.save_job(&job).await?;
            }
        }

        if count > 0 {
            info!(count, "queue recovery complete");
        }
        Ok(count)
    }

    /// Claim the next eligible job and mark it running.
    pub(crate) async fn claim_next(&self) -> Result<Option<Job>, QueueError> {
        let job = {
            let _guard = self.admission.lock().await;
            let Some(mut job) = self.store.queued_jobs().await?.into_iter().next() else {
                return Ok(None);
            };

            let removed = job.queue_position.take();
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            self.store.save_job(&job).await?;
            if let Some(position) = removed {
                self.compact_after(position).await?;
            }
            job
        };

        info!(job_id = %job.id, name = %job.name, "job started");
        Ok(Some(job))
    }

    /// Fire `job_started` for a claimed job. Runs on the job's own task so
    /// a slow handler holds only that slot.
    pub(crate) async fn announce_started(&self, job: &Job) {
        self.events
            .emit(&QueueEvent::new(QueueEventKind::JobStarted, job.clone()))
            .await;
    }

    /// Record the outcome of a running job.
    pub(crate) async fn finish(&self, mut job: Job, outcome: Result<String, String>) -> Result<Job, QueueError> {
        job.ended_at = Some(Utc::now());
        let kind = match outcome {
            Ok(output) => {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.output = Some(output);
                QueueEventKind::JobCompleted
            }
            Err(message) => {
                job.status = JobStatus::Failed;
                job.error = Some(message);
                QueueEventKind::JobFailed
            }
        };

        self.store.save_job(&job).await?;
        let record = ExecutionRecord::for_job(&job);
        self.store.append_history(&record).await?;

        match job.status {
            JobStatus::Completed => {
                info!(job_id = %job.id, duration_ms = record.duration_ms, "job completed")
            }
            _ => warn!(
                job_id = %job.id,
                duration_ms = record.duration_ms,
                error = job.error.as_deref().unwrap_or_default(),
                "job failed"
            ),
        }

        self.resolve_waiters(&job);
        self.events.emit(&QueueEvent::new(kind, job.clone())).await;
        Ok(job)
    }

    /// Shift queued jobs behind a removed position up by one.
    async fn compact_after(&self, removed: u32) -> Result<(), QueueError> {
        for mut job in self.store.jobs_with_status(JobStatus::Queued).await? {
            if let Some(position) = job.queue_position.filter(|p| *p > removed) {
                job.queue_position = Some(position - 1);
                self.store.save_job(&job).await?;
            }
        }
        Ok(())
    }

    fn resolve_waiters(&self, job: &Job) {
        if let Some(senders) = self.waiters.lock().remove(&job.id) {
            for tx in senders {
                let _ = tx.send(job.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
