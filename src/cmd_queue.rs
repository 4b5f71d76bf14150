//! Queue subcommand handlers for genflow.

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;

use genflow_store::JobSpec;

use crate::adapters::Services;
use crate::cli::PriorityArg;

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a `--params` argument.
pub(crate) fn parse_params(raw: &str) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(raw).context("--params must be a JSON document")
}

/// Store a queued job; a running `genflow run` picks it up.
pub(crate) async fn enqueue(
    services: &Services,
    name: String,
    params: &str,
    priority: PriorityArg,
    tags: Vec<String>,
) -> anyhow::Result<()> {
    let mut spec = JobSpec::new(name, parse_params(params)?).with_priority(priority.into());
    for tag in tags {
        spec = spec.with_tag(tag);
    }

    let id = services.queue.enqueue(spec).await?;
    let job = services.queue.get_task(&id).await?;
    print_json(&job)
}

pub(crate) async fn cancel(services: &Services, job_id: &str) -> anyhow::Result<()> {
    let cancelled = services.queue.cancel(job_id).await?;
    print_json(&serde_json::json!({ "job_id": job_id, "cancelled": cancelled }))
}

pub(crate) async fn task(services: &Services, job_id: &str) -> anyhow::Result<()> {
    match services.queue.get_task(job_id).await? {
        Some(job) => print_json(&job),
        None => bail!("Job not found: {}", job_id),
    }
}

pub(crate) async fn snapshot(services: &Services) -> anyhow::Result<()> {
    print_json(&services.queue.get_queue_snapshot().await?)
}

pub(crate) async fn history(
    services: &Services,
    job: Option<&str>,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let records = match since {
        Some(since) => services.store.history_since(since).await?,
        None => services.queue.history(job).await?,
    };
    print_json(&records)
}
