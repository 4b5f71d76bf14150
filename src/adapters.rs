//! Adapter types and utility functions for genflow.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use genflow_config::{Config, GeneratorConfig};
use genflow_queue::{Generator, QueueError, QueueManager};
use genflow_scheduler::ScheduleEngine;
use genflow_store::{JobStore, SqliteJobStore};

/// Longest slice of an error body carried into a job's error message.
const MAX_ERROR_BODY: usize = 200;

/// Get the .genflow directory path.
pub(crate) fn genflow_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".genflow"))
        .unwrap_or_else(|| PathBuf::from(".genflow"))
}

/// Generation contract backed by an HTTP endpoint.
///
/// Each job's parameters are POSTed as JSON. A 2xx response carrying
/// `{"output": "<reference>"}` is a success; anything else fails the job.
pub(crate) struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

#[derive(Deserialize)]
struct GenerateResponse {
    output: String,
}

impl HttpGenerator {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid generator header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for generator header {}", name))?;
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            headers,
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, params: &serde_json::Value) -> Result<String, QueueError> {
        if self.endpoint.is_empty() {
            return Err(QueueError::Generation("no generator endpoint configured".to_string()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(params)
            .send()
            .await
            .map_err(|e| QueueError::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(QueueError::Generation(format!(
                "endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| QueueError::Generation(format!("invalid response body: {}", e)))?;
        Ok(body.output)
    }
}

/// Store, queue and engine wired together from configuration.
pub(crate) struct Services {
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<QueueManager>,
    pub engine: Arc<ScheduleEngine>,
}

impl Services {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let path = config.store.resolved_path();
        let store: Arc<dyn JobStore> = Arc::new(
            SqliteJobStore::open(&path)
                .await
                .with_context(|| format!("Failed to open job store at {}", path.display()))?,
        );
        Self::with_store(store, config).await
    }

    pub async fn with_store(store: Arc<dyn JobStore>, config: &Config) -> anyhow::Result<Self> {
        let generator = Arc::new(HttpGenerator::new(&config.generator)?);
        let queue = Arc::new(QueueManager::new(store.clone(), generator, config.queue.clone()).await?);
        let engine = Arc::new(ScheduleEngine::new(
            store.clone(),
            queue.clone(),
            config.scheduler.clone(),
        ));
        Ok(Self {
            store,
            queue,
            engine,
        })
    }
}

#[cfg(test)]
#[path = "adapters_tests.rs"]
mod tests;
