//! Worker pool for job execution.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, error, info};

use genflow_store::Job;

use crate::config::QueueConfig;
use crate::manager::QueueManager;

/// Fixed set of execution slots fed from the queue manager.
pub struct WorkerPool {
    config: QueueConfig,
    semaphore: Arc<Semaphore>,
    total_processed: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Create a new worker pool.
    pub fn new(config: QueueConfig) -> Self {
        let permits = config.max_concurrent.max(1) as usize;
        Self {
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
            total_processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Jobs that reached a terminal status through this pool.
    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::SeqCst)
    }

    /// Dispatch loop: every free slot claims the next eligible job until
    /// shutdown. In-flight jobs are drained before returning.
    pub async fn run_loop(self: Arc<Self>, manager: Arc<QueueManager>, mut shutdown: watch::Receiver<bool>) {
        info!("Worker pool started with {} slots", self.config.max_concurrent.max(1));
        let poll = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            let permit = tokio::select! {
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!("Worker pool semaphore closed: {}", e);
                        break;
                    }
                },
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match manager.claim_next().await {
                Ok(Some(job)) => {
                    let manager = manager.clone();
                    let total_processed = self.total_processed.clone();
                    tokio::spawn(async move {
                        manager.announce_started(&job).await;
                        execute(&manager, job).await;
                        total_processed.fetch_add(1, Ordering::SeqCst);
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = manager.wakeup.notified() => {}
                        _ = tokio::time::sleep(poll) => {}
                        _ = shutdown_requested(&mut shutdown) => break,
                    }
                }
                Err(e) => {
                    error!("Failed to claim next job: {}", e);
                    drop(permit);
                    tokio::select! {
                        _ = tokio::time::sleep(poll) => {}
                        _ = shutdown_requested(&mut shutdown) => break,
                    }
                }
            }
        }

        info!("Worker pool shutting down, waiting for in-flight jobs");
        let slots = self.config.max_concurrent.max(1);
        if let Ok(all) = self.semaphore.acquire_many(slots).await {
            drop(all);
        }
        info!("Worker pool stopped");
    }
}

/// Run one claimed job through the generator and record the outcome.
///
/// Errors and panics from the generator both end as a failed job; neither
/// reaches the dispatch loop.
async fn execute(manager: &QueueManager, job: Job) {
    debug!(job_id = %job.id, "invoking generator");
    let outcome = AssertUnwindSafe(manager.generator.generate(&job.params))
        .catch_unwind()
        .await;

    let outcome = match outcome {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("generator panicked".to_string()),
    };

    let job_id = job.id.clone();
    if let Err(e) = manager.finish(job, outcome).await {
        error!(job_id = %job_id, "Failed to record job outcome: {}", e);
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
