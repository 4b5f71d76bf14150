//! genflow: generation job queue and schedule engine.
//!
//! Main entry point for the genflow service and operator CLI.

mod adapters;
mod cli;
mod cmd_queue;
mod cmd_run;
mod cmd_schedule;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use genflow_config::ConfigLoader;

use crate::adapters::{Services, genflow_dir};
use crate::cli::{Cli, Commands};

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.genflow/logs/ with daily rotation. Console
/// output goes to stderr so command output on stdout stays valid JSON.
fn init_tracing() -> anyhow::Result<()> {
    let log_dir = genflow_dir().join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("genflow")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)
        .context("Failed to create log file appender")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keeps the background writer alive for the life of the process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    for warning in ConfigLoader::validate(&config)? {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    let services = Services::open(&config).await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run::run(services).await,
        Commands::Enqueue {
            name,
            params,
            priority,
            tags,
        } => cmd_queue::enqueue(&services, name, &params, priority, tags).await,
        Commands::Cancel { job_id } => cmd_queue::cancel(&services, &job_id).await,
        Commands::Task { job_id } => cmd_queue::task(&services, &job_id).await,
        Commands::Queue => cmd_queue::snapshot(&services).await,
        Commands::History { job, since } => cmd_queue::history(&services, job.as_deref(), since).await,
        Commands::Schedule { action } => cmd_schedule::handle_schedule_command(&services, action).await,
    }
}
