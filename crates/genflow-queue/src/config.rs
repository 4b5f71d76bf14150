//! Queue configuration.

use serde::{Deserialize, Serialize};

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent execution slots.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// How long an idle slot waits before re-checking the store, in
    /// milliseconds. Enqueue wakes idle slots immediately.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_concurrent() -> u32 {
    2
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl QueueConfig {
    /// Config with the given slot count and default polling.
    pub fn with_max_concurrent(max_concurrent: u32) -> Self {
        Self {
            max_concurrent,
            ..Default::default()
        }
    }
}
