//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use genflow_queue::QueueConfig;
pub use genflow_scheduler::SchedulerConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. `~` is expanded.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// Database path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }
}

fn default_store_path() -> String {
    "~/.genflow/genflow.db".to_string()
}

/// Remote generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// URL that receives each job's parameters as a JSON POST.
    #[serde(default)]
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra request headers, e.g. `Authorization = "Bearer ${TOKEN}"`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: default_generator_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

fn default_generator_timeout_secs() -> u64 {
    300
}
