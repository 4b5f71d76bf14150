//! Job definition and status.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job priority levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// Low priority.
    Low = 0,
    /// Normal priority.
    #[default]
    Normal = 1,
    /// High priority.
    High = 2,
}

impl JobPriority {
    /// Numeric rank used for ordering in storage backends.
    pub fn rank(self) -> i64 {
        self as i64
    }
}

/// Job status.
///
/// `Queued -> Running -> {Completed, Failed}` or `Queued -> Cancelled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a free slot.
    #[default]
    Queued,
    /// Claimed by a worker slot.
    Running,
    /// Generation finished successfully.
    Completed,
    /// Generation raised an error.
    Failed,
    /// Cancelled while still queued.
    Cancelled,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Storage / wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status: {s}"))
    }
}

/// Caller-supplied description of work to enqueue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    /// Display name.
    pub name: String,
    /// Opaque generation parameters.
    #[serde(default)]
    pub params: serde_json::Value,
    /// Dispatch priority.
    #[serde(default)]
    pub priority: JobPriority,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl JobSpec {
    /// Create a spec with default priority and no tags.
    pub fn new(name: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            params,
            priority: JobPriority::Normal,
            tags: BTreeSet::new(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// One unit of submitted generation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Short unique id, immutable once assigned.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Opaque generation parameters.
    pub params: serde_json::Value,
    /// Dispatch priority.
    pub priority: JobPriority,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
    /// Current status.
    pub status: JobStatus,
    /// Progress, 0-100.
    pub progress: u8,
    /// Output reference, set only on success.
    pub output: Option<String>,
    /// Failure message, set only on failure.
    pub error: Option<String>,
    /// 1-based queue position, meaningful only while queued.
    pub queue_position: Option<u32>,
    /// Monotonic enqueue order.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Materialize a queued job from a spec.
    pub fn from_spec(spec: JobSpec, seq: u64, queue_position: u32) -> Self {
        Self {
            id: short_id(),
            name: spec.name,
            params: spec.params,
            priority: spec.priority,
            tags: spec.tags,
            status: JobStatus::Queued,
            progress: 0,
            output: None,
            error: None,
            queue_position: Some(queue_position),
            seq,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Wall-clock run time, if the job has both started and ended.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Eight hex characters from a v4 UUID.
fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
