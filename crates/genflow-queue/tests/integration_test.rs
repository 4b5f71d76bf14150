//! End-to-end tests for the queue: ordering, concurrency bounds, history
//! and shutdown, run against the SQLite store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;

use genflow_queue::{Generator, QueueConfig, QueueError, QueueEventKind, QueueManager};
use genflow_store::{JobPriority, JobSpec, JobStatus, JobStore, SqliteJobStore};

// ============================================================================
// Test Helpers
// ============================================================================

/// Generator that sleeps and tracks how many calls overlap.
struct SlowGenerator {
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl SlowGenerator {
    fn new(delay_ms: u64) -> (Self, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        (
            Self {
                delay: Duration::from_millis(delay_ms),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: peak.clone(),
            },
            peak,
        )
    }
}

#[async_trait]
impl Generator for SlowGenerator {
    async fn generate(&self, params: &serde_json::Value) -> Result<String, QueueError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let prompt = params.get("prompt").and_then(|v| v.as_str()).unwrap_or("");
        Ok(format!("generated: {}", prompt))
    }
}

async fn setup(generator: impl Generator + 'static, max_concurrent: u32) -> Arc<QueueManager> {
    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().await.unwrap());
    let config = QueueConfig {
        max_concurrent,
        poll_interval_ms: 20,
    };
    Arc::new(QueueManager::new(store, Arc::new(generator), config).await.unwrap())
}

fn job(name: &str) -> JobSpec {
    JobSpec::new(name, json!({ "prompt": name }))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let (generator, peak) = SlowGenerator::new(30);
    let manager = setup(generator, 2).await;

    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(manager.enqueue(job(&format!("job-{}", i))).await.unwrap());
    }

    let (tx, rx) = watch::channel(false);
    let handle = manager.start(rx);

    // Sample the persisted view while work is in progress.
    for _ in 0..10 {
        let snapshot = manager.get_queue_snapshot().await.unwrap();
        assert!(snapshot.stats.running <= 2);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for id in &ids {
        let done = manager.wait_for(id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(peak.load(Ordering::SeqCst), 2);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_high_priority_runs_first() {
    let (generator, _) = SlowGenerator::new(5);
    let manager = setup(generator, 1).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let log = order.clone();
    manager.on(QueueEventKind::JobCompleted, move |event| {
        log.lock().push(event.job.name.clone());
    });

    let low = manager
        .enqueue(job("low").with_priority(JobPriority::Low))
        .await
        .unwrap();
    let high = manager
        .enqueue(job("high").with_priority(JobPriority::High))
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    let handle = manager.start(rx);

    manager.wait_for(&low).await.unwrap();
    manager.wait_for(&high).await.unwrap();
    assert_eq!(*order.lock(), ["high", "low"]);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_fifo_within_priority_and_history() {
    let (generator, _) = SlowGenerator::new(15);
    let manager = setup(generator, 1).await;

    let first = manager.enqueue(job("first")).await.unwrap();
    let second = manager.enqueue(job("second")).await.unwrap();
    assert_eq!(
        manager.get_task(&second).await.unwrap().unwrap().queue_position,
        Some(2)
    );

    let (tx, rx) = watch::channel(false);
    let handle = manager.start(rx);

    let first = manager.wait_for(&first).await.unwrap();
    let second = manager.wait_for(&second).await.unwrap();
    assert_eq!(first.output.as_deref(), Some("generated: first"));
    assert!(first.ended_at.unwrap() <= second.started_at.unwrap());

    let history = manager.history(None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].job_id, first.id);
    assert_eq!(history[1].job_id, second.id);
    assert!(history.iter().all(|r| r.duration_ms > 0));
    assert!(history.iter().all(|r| r.status == JobStatus::Completed));

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_job() {
    let (generator, _) = SlowGenerator::new(50);
    let manager = setup(generator, 1).await;

    let (tx, rx) = watch::channel(false);
    let handle = manager.start(rx);

    let id = manager.enqueue(job("draining")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let job = manager.get_task(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_jobs_wait_while_stopped() {
    let (generator, _) = SlowGenerator::new(1);
    let manager = setup(generator, 1).await;

    let id = manager.enqueue(job("parked")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let job = manager.get_task(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.queue_position, Some(1));
}
