//! Schedule definitions: persisted recipes that produce jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// When a definition fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Cron expression (5, 6 or 7 fields).
    Cron { cron_expression: String },
    /// Single fire at an absolute UTC instant.
    Once { scheduled_at: DateTime<Utc> },
    /// Repeat every N seconds.
    Every { every_seconds: u64 },
}

impl Trigger {
    /// Whether the trigger fires at most once.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Trigger::Once { .. })
    }
}

/// Outcome of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
}

/// Mutable run state embedded in a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub last_status: Option<RunStatus>,
    pub last_error: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<i64>,
    /// Set iff the definition is enabled (and its trigger computes).
    pub next_run_at: Option<DateTime<Utc>>,
    /// Set iff a run triggered by this definition is in flight.
    pub running_at: Option<DateTime<Utc>>,
    /// Consecutive failed executions.
    pub consecutive_errors: u32,
    /// Consecutive failures to compute `next_run_at`.
    pub schedule_error_count: u32,
}

/// Creation payload for a definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionSpec {
    pub name: String,
    pub trigger: Trigger,
    /// Opaque generation parameter template.
    #[serde(default)]
    pub generation: serde_json::Value,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub delete_after_run: Option<bool>,
}

/// Partial update for a definition. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub generation: Option<serde_json::Value>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub delete_after_run: Option<bool>,
}

/// A persisted schedule definition ("cron job").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub generation: serde_json::Value,
    pub timeout_seconds: u64,
    pub delete_after_run: bool,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleDefinition {
    /// Build an enabled definition from a creation payload.
    ///
    /// `next_run_at` is left unset; the engine computes it.
    pub fn from_spec(spec: DefinitionSpec, default_timeout_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: spec.name,
            enabled: true,
            trigger: spec.trigger,
            generation: spec.generation,
            timeout_seconds: spec.timeout_seconds.unwrap_or(default_timeout_secs),
            delete_after_run: spec.delete_after_run.unwrap_or(false),
            state: RunState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.state.running_at.is_some()
    }

    /// Whether the definition should run at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && !self.is_running()
            && self.state.next_run_at.is_some_and(|next| next <= now)
    }

    /// Disable and clear the next run time.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.state.next_run_at = None;
    }
}
