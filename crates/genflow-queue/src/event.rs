//! Job lifecycle events.
//!
//! Handlers are registered per event kind and fired in registration order.
//! A handler may finish synchronously or hand back a future; [`EventBus::emit`]
//! awaits each deferred handler before moving on to the next one. A handler
//! that panics is logged and skipped; it never reaches the emitter.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::error;

use genflow_store::Job;

/// Event kinds emitted by the queue manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventKind {
    JobQueued,
    JobStarted,
    JobCompleted,
    JobFailed,
    JobCancelled,
}

impl QueueEventKind {
    pub const ALL: [QueueEventKind; 5] = [
        QueueEventKind::JobQueued,
        QueueEventKind::JobStarted,
        QueueEventKind::JobCompleted,
        QueueEventKind::JobFailed,
        QueueEventKind::JobCancelled,
    ];

    /// Event name, e.g. `job_queued`.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueEventKind::JobQueued => "job_queued",
            QueueEventKind::JobStarted => "job_started",
            QueueEventKind::JobCompleted => "job_completed",
            QueueEventKind::JobFailed => "job_failed",
            QueueEventKind::JobCancelled => "job_cancelled",
        }
    }
}

impl std::fmt::Display for QueueEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event: {s}"))
    }
}

/// An emitted event with a snapshot of the job at that moment.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    pub job: Job,
    pub at: DateTime<Utc>,
}

impl QueueEvent {
    pub fn new(kind: QueueEventKind, job: Job) -> Self {
        Self {
            kind,
            job,
            at: Utc::now(),
        }
    }
}

/// What a handler hands back: nothing left to do, or a future to await.
pub enum HandlerResult {
    Done,
    Deferred(BoxFuture<'static, ()>),
}

impl HandlerResult {
    /// Wrap a future to be awaited by the emitter.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        HandlerResult::Deferred(Box::pin(future))
    }
}

impl From<()> for HandlerResult {
    fn from(_: ()) -> Self {
        HandlerResult::Done
    }
}

impl From<BoxFuture<'static, ()>> for HandlerResult {
    fn from(future: BoxFuture<'static, ()>) -> Self {
        HandlerResult::Deferred(future)
    }
}

type Handler = Arc<dyn Fn(&QueueEvent) -> HandlerResult + Send + Sync>;

/// Ordered handler lists keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<QueueEventKind, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`.
    pub fn on<F, R>(&self, kind: QueueEventKind, handler: F)
    where
        F: Fn(&QueueEvent) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        let handler: Handler =
            Arc::new(move |event: &QueueEvent| -> HandlerResult { handler(event).into() });
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: QueueEventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Fire `event`, resolving every handler in registration order.
    pub async fn emit(&self, event: &QueueEvent) {
        // Snapshot so no lock is held across an await.
        let handlers = self.handlers.read().get(&event.kind).cloned().unwrap_or_default();
        for handler in handlers {
            let deferred = match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(HandlerResult::Done) => continue,
                Ok(HandlerResult::Deferred(future)) => future,
                Err(_) => {
                    error!(event = %event.kind, job_id = %event.job.id, "event handler panicked");
                    continue;
                }
            };
            if AssertUnwindSafe(deferred).catch_unwind().await.is_err() {
                error!(event = %event.kind, job_id = %event.job.id, "deferred event handler panicked");
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
