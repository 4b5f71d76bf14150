//! Next-run computation for triggers.
//!
//! Cron expressions follow the `cron` crate's format:
//! `second minute hour day_of_month month day_of_week [year]`.
//! Classic five-field expressions are accepted and run at second 0.

use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;
use tracing::warn;

use genflow_store::{ScheduleDefinition, Trigger};

use crate::error::ScheduleError;

/// Parse a cron expression, widening five-field expressions.
pub fn parse_cron(expression: &str) -> Result<Schedule, ScheduleError> {
    let expression = expression.trim();
    let normalized = if expression.split_whitespace().count() == 5 {
        format!("0 {}", expression)
    } else {
        expression.to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// First fire time of `trigger` strictly after `from`.
///
/// A `once` trigger always yields its `scheduled_at`, even when that is
/// already in the past; the next tick then picks it up.
pub fn compute_next_run(trigger: &Trigger, from: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
    match trigger {
        Trigger::Cron { cron_expression } => parse_cron(cron_expression)?
            .after(&from)
            .next()
            .ok_or_else(|| ScheduleError::NoUpcoming(cron_expression.clone())),
        Trigger::Every { every_seconds: 0 } => Err(ScheduleError::ZeroInterval),
        Trigger::Every { every_seconds } => {
            add_seconds(from, *every_seconds).ok_or(ScheduleError::IntervalOutOfRange(*every_seconds))
        }
        Trigger::Once { scheduled_at } => Ok(*scheduled_at),
    }
}

/// `from` plus `seconds`, or `None` when the result leaves chrono's range.
pub(crate) fn add_seconds(from: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| from.checked_add_signed(delta))
}

/// Recompute `next_run_at` and track computation failures.
///
/// Success resets `schedule_error_count`. Each failure clears `next_run_at`
/// and bumps the count; reaching `max_errors` disables the definition.
/// Returns whether a next run time was computed.
pub fn refresh_next_run<F>(
    definition: &mut ScheduleDefinition,
    from: DateTime<Utc>,
    max_errors: u32,
    next_run: F,
) -> bool
where
    F: Fn(&Trigger, DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError>,
{
    match next_run(&definition.trigger, from) {
        Ok(next) => {
            definition.state.next_run_at = Some(next);
            definition.state.schedule_error_count = 0;
            true
        }
        Err(e) => {
            definition.state.next_run_at = None;
            definition.state.schedule_error_count += 1;
            warn!(
                definition_id = %definition.id,
                name = %definition.name,
                errors = definition.state.schedule_error_count,
                "Failed to compute next run: {}", e
            );
            if definition.state.schedule_error_count >= max_errors {
                definition.disable();
                warn!(
                    definition_id = %definition.id,
                    name = %definition.name,
                    "Schedule definition auto-disabled after repeated schedule errors"
                );
            }
            false
        }
    }
}
