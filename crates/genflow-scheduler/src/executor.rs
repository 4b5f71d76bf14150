//! Executor: turns one schedule definition into one queued job and folds
//! the outcome back onto the definition.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use genflow_queue::QueueManager;
use genflow_store::{JobSpec, JobStatus, RunStatus, ScheduleDefinition, Trigger};

use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::schedule::{add_seconds, refresh_next_run};

/// Tag carried by every job produced from a schedule definition.
pub const SCHEDULED_TAG: &str = "scheduled";

/// Outcome of one scheduled run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub status: RunStatus,
    pub error: Option<String>,
    /// Id of the submitted job, if submission got that far.
    pub job_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn ok(job_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Ok,
            error: None,
            job_id: Some(job_id),
            started_at,
            ended_at: Utc::now(),
        }
    }

    pub fn error(job_id: Option<String>, started_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(message.into()),
            job_id,
            started_at,
            ended_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// What the caller must do with the definition after applying a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// Remove the definition instead of saving it.
    pub delete: bool,
}

/// Submits scheduled runs through the queue manager.
pub struct Executor {
    queue: Arc<QueueManager>,
}

impl Executor {
    pub fn new(queue: Arc<QueueManager>) -> Self {
        Self { queue }
    }

    /// Enqueue a job built from the definition and wait for it, bounded by
    /// the definition's timeout. Never fails: submission errors and
    /// timeouts come back as an error result.
    pub async fn execute(&self, definition: &ScheduleDefinition) -> ExecutionResult {
        let started_at = Utc::now();
        let spec = JobSpec::new(
            format!("[scheduled] {}", definition.name),
            definition.generation.clone(),
        )
        .with_tag(SCHEDULED_TAG);

        let job_id = match self.queue.enqueue(spec).await {
            Ok(id) => id,
            Err(e) => {
                return ExecutionResult::error(None, started_at, format!("Failed to submit job: {}", e));
            }
        };
        debug!(definition_id = %definition.id, job_id = %job_id, "scheduled job submitted");

        let limit = Duration::from_secs(definition.timeout_seconds);
        match tokio::time::timeout(limit, self.queue.wait_for(&job_id)).await {
            Ok(Ok(job)) => match job.status {
                JobStatus::Completed => ExecutionResult::ok(job_id, started_at),
                JobStatus::Failed => {
                    let message = job.error.unwrap_or_else(|| "job failed".to_string());
                    ExecutionResult::error(Some(job_id), started_at, message)
                }
                status => ExecutionResult::error(
                    Some(job_id),
                    started_at,
                    format!("job ended with status {}", status),
                ),
            },
            Ok(Err(e)) => ExecutionResult::error(Some(job_id), started_at, e.to_string()),
            Err(_) => {
                // A job that never left the queue is withdrawn; a running one
                // is left to finish on its own.
                match self.queue.cancel(&job_id).await {
                    Ok(true) => debug!(job_id = %job_id, "timed out job cancelled"),
                    Ok(false) => {}
                    Err(e) => warn!(job_id = %job_id, "Failed to cancel timed out job: {}", e),
                }
                ExecutionResult::error(
                    Some(job_id),
                    started_at,
                    format!("timed out after {}s", definition.timeout_seconds),
                )
            }
        }
    }
}

/// Fold a run result into the definition's state.
///
/// Pure apart from logging: the next run time comes from `next_run`, so
/// this is testable without a clock or a cron parser.
pub fn apply_result<F>(
    definition: &mut ScheduleDefinition,
    result: &ExecutionResult,
    config: &SchedulerConfig,
    next_run: F,
) -> ApplyOutcome
where
    F: Fn(&Trigger, DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError>,
{
    let state = &mut definition.state;
    state.running_at = None;
    state.last_run_at = Some(result.started_at);
    state.last_duration_ms = Some(result.duration_ms());
    definition.updated_at = result.ended_at;

    if result.is_ok() {
        state.consecutive_errors = 0;
        state.last_status = Some(RunStatus::Ok);
        state.last_error = None;
    } else {
        state.consecutive_errors += 1;
        state.last_status = Some(RunStatus::Error);
        state.last_error = result.error.clone();
    }

    if definition.trigger.is_one_shot() {
        definition.disable();
        return ApplyOutcome {
            delete: definition.delete_after_run && result.is_ok(),
        };
    }

    // Paused while the run was in flight.
    if !definition.enabled {
        return ApplyOutcome::default();
    }

    refresh_next_run(definition, result.ended_at, config.max_schedule_errors, next_run);

    let errors = definition.state.consecutive_errors;
    if !result.is_ok() && errors >= config.error_backoff_threshold {
        // An out-of-range backoff leaves the computed next run unfloored.
        let floor = add_seconds(result.ended_at, config.error_backoff_secs);
        let floored = definition.state.next_run_at.zip(floor).filter(|(next, floor)| next < floor);
        if let Some((next, floor)) = floored {
            debug!(
                definition_id = %definition.id,
                errors,
                "backing off next run from {} to {}", next, floor
            );
            definition.state.next_run_at = Some(floor);
        }
    }

    ApplyOutcome::default()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
