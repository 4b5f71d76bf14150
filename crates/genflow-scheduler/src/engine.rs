//! Schedule engine: owns schedule definitions and decides which are due.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use genflow_queue::QueueManager;
use genflow_store::{DefinitionPatch, DefinitionSpec, JobStore, ScheduleDefinition};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::executor::{Executor, apply_result};
use crate::schedule::{compute_next_run, refresh_next_run};

/// Engine summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    /// Whether the engine loop is configured to run.
    pub enabled: bool,
    pub total_jobs: usize,
    pub enabled_jobs: usize,
    /// Earliest `next_run_at` across enabled definitions.
    pub next_wake_at: Option<DateTime<Utc>>,
}

/// Drives schedule definitions through the executor on a fixed cadence.
pub struct ScheduleEngine {
    config: SchedulerConfig,
    store: Arc<dyn JobStore>,
    executor: Executor,
    /// Serializes claims and read-modify-write of stored definitions, so
    /// overlapping ticks never double-run and edits made mid-run survive.
    claim: Mutex<()>,
}

impl ScheduleEngine {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<QueueManager>, config: SchedulerConfig) -> Self {
        Self {
            config,
            store,
            executor: Executor::new(queue),
            claim: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Create a definition and compute its first run.
    ///
    /// A trigger that cannot be computed is still stored, with one schedule
    /// error counted, so it can be repaired with [`update`](Self::update).
    pub async fn add(&self, spec: DefinitionSpec) -> Result<ScheduleDefinition, SchedulerError> {
        validate_name(&spec.name)?;
        validate_timeout(spec.timeout_seconds)?;

        let mut definition = ScheduleDefinition::from_spec(spec, self.config.default_timeout_secs);
        self.refresh(&mut definition, Utc::now());
        self.store.save_definition(&definition).await?;

        info!(
            definition_id = %definition.id,
            name = %definition.name,
            next_run_at = ?definition.state.next_run_at,
            "Schedule definition added"
        );
        Ok(definition)
    }

    /// All definitions, oldest first.
    pub async fn list(&self) -> Result<Vec<ScheduleDefinition>, SchedulerError> {
        Ok(self.store.list_definitions().await?)
    }

    pub async fn get(&self, id: &str) -> Result<ScheduleDefinition, SchedulerError> {
        self.store
            .get_definition(id)
            .await?
            .ok_or_else(|| SchedulerError::DefinitionNotFound(id.to_string()))
    }

    /// Apply a partial update.
    ///
    /// `next_run_at` is recomputed from now when the trigger changes or the
    /// definition goes from disabled to enabled. Either transition starts the
    /// schedule error count over, as [`resume`](Self::resume) does.
    pub async fn update(&self, id: &str, patch: DefinitionPatch) -> Result<ScheduleDefinition, SchedulerError> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        validate_timeout(patch.timeout_seconds)?;

        let _guard = self.claim.lock().await;
        let mut definition = self.get(id).await?;
        let was_enabled = definition.enabled;

        if let Some(name) = patch.name {
            definition.name = name;
        }
        if let Some(generation) = patch.generation {
            definition.generation = generation;
        }
        if let Some(timeout) = patch.timeout_seconds {
            definition.timeout_seconds = timeout;
        }
        if let Some(delete_after_run) = patch.delete_after_run {
            definition.delete_after_run = delete_after_run;
        }

        let trigger_changed = match patch.trigger {
            Some(trigger) if trigger != definition.trigger => {
                definition.trigger = trigger;
                definition.state.schedule_error_count = 0;
                true
            }
            _ => false,
        };

        match patch.enabled {
            Some(false) => definition.disable(),
            Some(true) if !was_enabled => {
                definition.enabled = true;
                definition.state.schedule_error_count = 0;
            }
            Some(true) | None => {}
        }

        if definition.enabled && (trigger_changed || !was_enabled) {
            self.refresh(&mut definition, Utc::now());
        }

        definition.updated_at = Utc::now();
        self.store.save_definition(&definition).await?;
        info!(definition_id = %definition.id, "Schedule definition updated");
        Ok(definition)
    }

    /// Delete a definition. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> Result<bool, SchedulerError> {
        let _guard = self.claim.lock().await;
        let removed = self.store.delete_definition(id).await?;
        if removed {
            info!(definition_id = id, "Schedule definition removed");
        }
        Ok(removed)
    }

    /// Disable a definition and clear its next run.
    pub async fn pause(&self, id: &str) -> Result<ScheduleDefinition, SchedulerError> {
        let _guard = self.claim.lock().await;
        let mut definition = self.get(id).await?;
        definition.disable();
        definition.updated_at = Utc::now();
        self.store.save_definition(&definition).await?;
        info!(definition_id = id, "Schedule definition paused");
        Ok(definition)
    }

    /// Enable a definition with its next run computed from now.
    ///
    /// The schedule error count starts over, so a definition that was
    /// auto-disabled gets a fresh set of attempts.
    pub async fn resume(&self, id: &str) -> Result<ScheduleDefinition, SchedulerError> {
        let _guard = self.claim.lock().await;
        let mut definition = self.get(id).await?;
        definition.enabled = true;
        definition.state.schedule_error_count = 0;
        self.refresh(&mut definition, Utc::now());
        definition.updated_at = Utc::now();
        self.store.save_definition(&definition).await?;
        info!(
            definition_id = id,
            next_run_at = ?definition.state.next_run_at,
            "Schedule definition resumed"
        );
        Ok(definition)
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let definitions = self.store.list_definitions().await?;
        let enabled: Vec<_> = definitions.iter().filter(|d| d.enabled).collect();
        Ok(SchedulerStatus {
            enabled: self.config.enabled,
            total_jobs: definitions.len(),
            enabled_jobs: enabled.len(),
            next_wake_at: enabled.iter().filter_map(|d| d.state.next_run_at).min(),
        })
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Startup recovery.
    ///
    /// Clears every `running_at` left behind by a previous process, then runs
    /// each enabled definition whose next run is already past exactly once.
    /// Returns the number of catch-up runs.
    pub async fn recover_on_startup(&self) -> Result<usize, SchedulerError> {
        let now = Utc::now();

        let missed = {
            let _guard = self.claim.lock().await;
            let mut missed = Vec::new();
            for mut definition in self.store.list_definitions().await? {
                if let Some(running_at) = definition.state.running_at.take() {
                    self.store.save_definition(&definition).await?;
                    warn!(
                        definition_id = %definition.id,
                        %running_at,
                        "Cleared stale running marker"
                    );
                }
                if definition.is_due(now) {
                    definition.state.running_at = Some(now);
                    self.store.save_definition(&definition).await?;
                    missed.push(definition);
                }
            }
            missed
        };

        if !missed.is_empty() {
            info!(count = missed.len(), "Running missed schedule definitions");
        }
        let count = missed.len();
        join_all(missed.into_iter().map(|d| self.run_definition(d))).await;
        Ok(count)
    }

    /// Clear `running_at` on definitions whose run started longer than the
    /// stuck threshold before `now`. Nothing else is touched.
    ///
    /// A threshold beyond chrono's range never marks a run as stuck.
    pub async fn sweep_stuck(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let Some(threshold) = i64::try_from(self.config.stuck_threshold_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
        else {
            return Ok(0);
        };
        let _guard = self.claim.lock().await;

        let mut cleared = 0;
        for mut definition in self.store.list_definitions().await? {
            let Some(running_at) = definition.state.running_at else {
                continue;
            };
            if now - running_at > threshold {
                definition.state.running_at = None;
                self.store.save_definition(&definition).await?;
                warn!(
                    definition_id = %definition.id,
                    %running_at,
                    "Cleared stuck running marker"
                );
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    // ========================================================================
    // Ticking
    // ========================================================================

    pub async fn tick(&self) -> Result<usize, SchedulerError> {
        self.tick_at(Utc::now()).await
    }

    /// One evaluation pass at `now`.
    ///
    /// Enabled definitions without a next run get another computation
    /// attempt. Due definitions are claimed, then run concurrently; the call
    /// returns once every run has been applied. Returns the number of runs.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let due = {
            let _guard = self.claim.lock().await;
            let mut due = Vec::new();
            for mut definition in self.store.list_definitions().await? {
                if !definition.enabled || definition.is_running() {
                    continue;
                }
                if definition.state.next_run_at.is_none() {
                    self.refresh(&mut definition, now);
                    self.store.save_definition(&definition).await?;
                }
                if definition.is_due(now) {
                    definition.state.running_at = Some(now);
                    self.store.save_definition(&definition).await?;
                    due.push(definition);
                }
            }
            due
        };

        if due.is_empty() {
            return Ok(0);
        }
        debug!(count = due.len(), "Schedule definitions due");
        let count = due.len();
        join_all(due.into_iter().map(|d| self.run_definition(d))).await;
        Ok(count)
    }

    /// Execute one claimed definition and persist the applied outcome.
    ///
    /// Failures end up in the definition's state or the log; nothing
    /// propagates to the tick.
    async fn run_definition(&self, definition: ScheduleDefinition) {
        info!(definition_id = %definition.id, name = %definition.name, "Running schedule definition");
        let result = self.executor.execute(&definition).await;
        let _guard = self.claim.lock().await;

        // The definition may have been edited or removed mid-run.
        let mut current = match self.store.get_definition(&definition.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                info!(definition_id = %definition.id, "Schedule definition removed during run");
                return;
            }
            Err(e) => {
                error!(definition_id = %definition.id, "Failed to reload schedule definition: {}", e);
                return;
            }
        };

        let outcome = apply_result(&mut current, &result, &self.config, compute_next_run);
        match &result.error {
            None => info!(
                definition_id = %current.id,
                duration_ms = result.duration_ms(),
                next_run_at = ?current.state.next_run_at,
                "Scheduled run succeeded"
            ),
            Some(message) => warn!(
                definition_id = %current.id,
                consecutive_errors = current.state.consecutive_errors,
                next_run_at = ?current.state.next_run_at,
                "Scheduled run failed: {}", message
            ),
        }

        let persisted = if outcome.delete {
            info!(definition_id = %current.id, "Deleting one-shot definition after successful run");
            self.store.delete_definition(&current.id).await.map(|_| ())
        } else {
            self.store.save_definition(&current).await
        };
        if let Err(e) = persisted {
            error!(definition_id = %current.id, "Failed to persist run outcome: {}", e);
        }
    }

    /// Startup recovery, then tick and sweep until `shutdown` flips.
    ///
    /// Each tick runs in its own task so a long run does not hold back the
    /// next tick. Runs still in flight at shutdown are aborted; their
    /// `running_at` is cleared by the next startup recovery.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("Schedule engine disabled");
            return;
        }

        match self.recover_on_startup().await {
            Ok(count) => info!(catch_up_runs = count, "Schedule engine recovered"),
            Err(e) => error!("Schedule engine recovery failed: {}", e),
        }

        info!(
            "Schedule engine started (tick interval: {}s)",
            self.config.tick_interval_secs
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.tick_interval_secs.max(1)));
        let mut sweeper =
            tokio::time::interval(Duration::from_secs(self.config.stuck_sweep_interval_secs.max(1)));
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let engine = self.clone();
                    in_flight.spawn(async move {
                        if let Err(e) = engine.tick().await {
                            error!("Schedule tick failed: {}", e);
                        }
                    });
                }
                _ = sweeper.tick() => {
                    match self.sweep_stuck(Utc::now()).await {
                        Ok(0) => {}
                        Ok(cleared) => warn!(cleared, "Stuck schedule runs cleared"),
                        Err(e) => error!("Stuck sweep failed: {}", e),
                    }
                }
                Some(_) = in_flight.join_next() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(in_flight = in_flight.len(), "Schedule engine shutting down");
        in_flight.shutdown().await;
    }

    fn refresh(&self, definition: &mut ScheduleDefinition, from: DateTime<Utc>) -> bool {
        refresh_next_run(definition, from, self.config.max_schedule_errors, compute_next_run)
    }
}

fn validate_name(name: &str) -> Result<(), SchedulerError> {
    if name.trim().is_empty() {
        return Err(SchedulerError::InvalidDefinition("name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_timeout(timeout_seconds: Option<u64>) -> Result<(), SchedulerError> {
    if timeout_seconds == Some(0) {
        return Err(SchedulerError::InvalidDefinition(
            "timeout_seconds must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
