use super::*;
use crate::error::QueueError;
use crate::event::{QueueEvent, QueueEventKind};
use crate::generator::Generator;
use async_trait::async_trait;
use genflow_store::{JobSpec, JobStatus, MemoryJobStore};

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _params: &serde_json::Value) -> Result<String, QueueError> {
        Err(QueueError::Generation("upstream returned 503".to_string()))
    }
}

struct PanickingGenerator;

#[async_trait]
impl Generator for PanickingGenerator {
    async fn generate(&self, _params: &serde_json::Value) -> Result<String, QueueError> {
        panic!("boom");
    }
}

struct OkGenerator;

#[async_trait]
impl Generator for OkGenerator {
    async fn generate(&self, params: &serde_json::Value) -> Result<String, QueueError> {
        Ok(params["prompt"].as_str().unwrap_or_default().to_uppercase())
    }
}

async fn manager_with(generator: Arc<dyn Generator>) -> Arc<QueueManager> {
    Arc::new(
        QueueManager::new(
            Arc::new(MemoryJobStore::new()),
            generator,
            QueueConfig {
                max_concurrent: 2,
                poll_interval_ms: 10,
            },
        )
        .await
        .unwrap(),
    )
}

#[test]
fn test_pool_creation() {
    let pool = WorkerPool::new(QueueConfig::with_max_concurrent(3));
    assert_eq!(pool.semaphore.available_permits(), 3);
    assert_eq!(pool.total_processed(), 0);
}

#[test]
fn test_pool_has_at_least_one_slot() {
    let pool = WorkerPool::new(QueueConfig::with_max_concurrent(0));
    assert_eq!(pool.semaphore.available_permits(), 1);
}

#[tokio::test]
async fn test_execute_success() {
    let manager = manager_with(Arc::new(OkGenerator)).await;
    let id = manager
        .enqueue(JobSpec::new("cat", serde_json::json!({"prompt": "a cat"})))
        .await
        .unwrap();
    let job = manager.claim_next().await.unwrap().unwrap();

    execute(&manager, job).await;

    let job = manager.get_task(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.output.as_deref(), Some("A CAT"));
}

#[tokio::test]
async fn test_execute_generator_error_fails_job() {
    let manager = manager_with(Arc::new(FailingGenerator)).await;
    let id = manager
        .enqueue(JobSpec::new("x", serde_json::Value::Null))
        .await
        .unwrap();
    let job = manager.claim_next().await.unwrap().unwrap();

    execute(&manager, job).await;

    let job = manager.get_task(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("upstream returned 503"));
    assert_eq!(manager.history(Some(&id)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_execute_generator_panic_fails_job() {
    let manager = manager_with(Arc::new(PanickingGenerator)).await;
    let id = manager
        .enqueue(JobSpec::new("x", serde_json::Value::Null))
        .await
        .unwrap();
    let job = manager.claim_next().await.unwrap().unwrap();

    execute(&manager, job).await;

    let job = manager.get_task(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("generator panicked"));
}

#[tokio::test]
async fn test_run_loop_processes_and_stops() {
    let manager = manager_with(Arc::new(OkGenerator)).await;
    let a = manager
        .enqueue(JobSpec::new("a", serde_json::json!({"prompt": "a"})))
        .await
        .unwrap();
    let b = manager
        .enqueue(JobSpec::new("b", serde_json::json!({"prompt": "b"})))
        .await
        .unwrap();

    let pool = Arc::new(WorkerPool::new(manager.config().clone()));
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(pool.clone().run_loop(manager.clone(), rx));

    let a = manager.wait_for(&a).await.unwrap();
    let b = manager.wait_for(&b).await.unwrap();
    assert_eq!(a.status, JobStatus::Completed);
    assert_eq!(b.status, JobStatus::Completed);

    tx.send(true).unwrap();
    handle.await.unwrap();
    assert_eq!(pool.total_processed(), 2);
    assert_eq!(pool.semaphore.available_permits(), 2);
}

#[tokio::test]
async fn test_run_loop_survives_failures() {
    let manager = manager_with(Arc::new(PanickingGenerator)).await;
    let (tx, rx) = watch::channel(false);
    let handle = manager.start(rx);

    let first = manager
        .enqueue(JobSpec::new("first", serde_json::Value::Null))
        .await
        .unwrap();
    assert_eq!(manager.wait_for(&first).await.unwrap().status, JobStatus::Failed);

    // The pool keeps dispatching after a panic.
    let second = manager
        .enqueue(JobSpec::new("second", serde_json::Value::Null))
        .await
        .unwrap();
    assert_eq!(manager.wait_for(&second).await.unwrap().status, JobStatus::Failed);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_panicking_started_handler_does_not_stop_pool() {
    let manager = manager_with(Arc::new(OkGenerator)).await;
    manager.on(QueueEventKind::JobStarted, |event: &QueueEvent| {
        if event.job.name == "a" {
            panic!("handler bug");
        }
    });

    let a = manager
        .enqueue(JobSpec::new("a", serde_json::json!({"prompt": "a"})))
        .await
        .unwrap();
    let b = manager
        .enqueue(JobSpec::new("b", serde_json::json!({"prompt": "b"})))
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    let handle = manager.start(rx);

    assert_eq!(manager.wait_for(&a).await.unwrap().status, JobStatus::Completed);
    assert_eq!(manager.wait_for(&b).await.unwrap().status, JobStatus::Completed);
    assert!(!handle.is_finished());

    tx.send(true).unwrap();
    handle.await.unwrap();
    assert_eq!(manager.worker_pool().total_processed(), 2);
}
