//! Schedule subcommand handlers for genflow.

use chrono::{DateTime, Utc};

use genflow_store::{DefinitionSpec, Trigger};

use crate::adapters::Services;
use crate::cli::ScheduleAction;
use crate::cmd_queue::{parse_params, print_json};

/// Handle schedule subcommands.
pub(crate) async fn handle_schedule_command(services: &Services, action: ScheduleAction) -> anyhow::Result<()> {
    let engine = &services.engine;
    match action {
        ScheduleAction::Add {
            name,
            cron,
            every,
            at,
            params,
            timeout,
            delete_after_run,
        } => {
            let spec = DefinitionSpec {
                name,
                trigger: trigger_from_args(cron, every, at)?,
                generation: parse_params(&params)?,
                timeout_seconds: timeout,
                delete_after_run: Some(delete_after_run),
            };
            print_json(&engine.add(spec).await?)
        }
        ScheduleAction::List => print_json(&engine.list().await?),
        ScheduleAction::Pause { id } => print_json(&engine.pause(&id).await?),
        ScheduleAction::Resume { id } => print_json(&engine.resume(&id).await?),
        ScheduleAction::Remove { id } => {
            let removed = engine.remove(&id).await?;
            print_json(&serde_json::json!({ "id": id, "removed": removed }))
        }
        ScheduleAction::Status => print_json(&engine.status().await?),
    }
}

fn trigger_from_args(
    cron: Option<String>,
    every: Option<u64>,
    at: Option<DateTime<Utc>>,
) -> anyhow::Result<Trigger> {
    match (cron, every, at) {
        (Some(cron_expression), None, None) => Ok(Trigger::Cron { cron_expression }),
        (None, Some(every_seconds), None) => Ok(Trigger::Every { every_seconds }),
        (None, None, Some(scheduled_at)) => Ok(Trigger::Once { scheduled_at }),
        _ => anyhow::bail!("exactly one of --cron, --every or --at is required"),
    }
}
