//! Scheduler errors.

use genflow_queue::QueueError;
use genflow_store::StoreError;
use thiserror::Error;

/// A trigger that cannot produce a next run time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The cron expression does not parse.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// The cron expression parses but never fires again.
    #[error("Cron expression '{0}' has no upcoming time")]
    NoUpcoming(String),

    /// `every_seconds` is zero.
    #[error("Interval must be at least one second")]
    ZeroInterval,

    /// The interval pushes past the representable time range.
    #[error("Interval of {0} seconds is out of range")]
    IntervalOutOfRange(u64),
}

/// Scheduler error types.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Definition not found.
    #[error("Schedule definition not found: {0}")]
    DefinitionNotFound(String),

    /// Rejected creation payload or patch.
    #[error("Invalid schedule definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
