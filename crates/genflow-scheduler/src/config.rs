//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the engine loop runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Seconds between stuck-run sweeps.
    #[serde(default = "default_stuck_sweep_interval_secs")]
    pub stuck_sweep_interval_secs: u64,

    /// A `running_at` older than this is treated as a crashed run.
    #[serde(default = "default_stuck_threshold_secs")]
    pub stuck_threshold_secs: u64,

    /// Per-run timeout for definitions that do not set one.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Consecutive execution errors before the backoff floor applies.
    #[serde(default = "default_error_backoff_threshold")]
    pub error_backoff_threshold: u32,

    /// Minimum delay after the last run once backing off.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Consecutive next-run computation failures before auto-disable.
    #[serde(default = "default_max_schedule_errors")]
    pub max_schedule_errors: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_tick_interval_secs() -> u64 {
    1
}

fn default_stuck_sweep_interval_secs() -> u64 {
    300
}

fn default_stuck_threshold_secs() -> u64 {
    2 * 60 * 60
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_error_backoff_threshold() -> u32 {
    3
}

fn default_error_backoff_secs() -> u64 {
    300
}

fn default_max_schedule_errors() -> u32 {
    3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_interval_secs: default_tick_interval_secs(),
            stuck_sweep_interval_secs: default_stuck_sweep_interval_secs(),
            stuck_threshold_secs: default_stuck_threshold_secs(),
            default_timeout_secs: default_timeout_secs(),
            error_backoff_threshold: default_error_backoff_threshold(),
            error_backoff_secs: default_error_backoff_secs(),
            max_schedule_errors: default_max_schedule_errors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_table() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.tick_interval_secs, 1);
        assert_eq!(config.stuck_threshold_secs, 7200);
        assert_eq!(config.error_backoff_threshold, 3);
        assert_eq!(config.error_backoff_secs, 300);
        assert_eq!(config.max_schedule_errors, 3);
    }
}
