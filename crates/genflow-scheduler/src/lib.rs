//! # Genflow Scheduler
//!
//! Recurring and one-shot generation jobs on top of the queue.
//!
//! - [`ScheduleEngine`] owns schedule definitions, ticks on a fixed cadence,
//!   recovers after a restart and clears stuck runs
//! - [`Executor`] turns one definition into one queued job and waits for it
//! - [`apply_result`] folds a run's outcome back into the definition
//! - [`compute_next_run`] evaluates cron, interval and one-shot triggers

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod schedule;

pub use config::SchedulerConfig;
pub use engine::{ScheduleEngine, SchedulerStatus};
pub use error::{ScheduleError, SchedulerError};
pub use executor::{ApplyOutcome, ExecutionResult, Executor, SCHEDULED_TAG, apply_result};
pub use schedule::{compute_next_run, parse_cron, refresh_next_run};
