//! CLI definitions for genflow.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

use genflow_store::JobPriority;

/// genflow CLI.
#[derive(Parser)]
#[command(name = "genflow")]
#[command(about = "Generation job queue and schedule engine")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.genflow/config.toml if present)
    #[arg(short, long, global = true, env = "GENFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the worker pool and schedule engine in the foreground (default)
    Run,

    /// Submit an ad-hoc job
    Enqueue {
        /// Display name
        name: String,

        /// Generation parameters as a JSON document
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// Dispatch priority
        #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
        priority: PriorityArg,

        /// Tag, may be repeated
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Cancel a queued job
    Cancel {
        /// Job ID
        job_id: String,
    },

    /// Show one job
    Task {
        /// Job ID
        job_id: String,
    },

    /// Show queue counts plus queued and running jobs
    Queue,

    /// Show execution history
    History {
        /// Only records for this job
        #[arg(long, conflicts_with = "since")]
        job: Option<String>,

        /// Only records at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },

    /// Schedule definition management
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ScheduleAction {
    /// Create a schedule definition
    #[command(group(ArgGroup::new("trigger").required(true).args(["cron", "every", "at"])))]
    Add {
        /// Definition name
        name: String,

        /// Cron expression (5, 6 or 7 fields)
        #[arg(long)]
        cron: Option<String>,

        /// Fixed interval in seconds
        #[arg(long)]
        every: Option<u64>,

        /// Single run at this RFC 3339 timestamp
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Generation parameters as a JSON document
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// Per-run timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Delete a one-shot definition after it succeeds
        #[arg(long)]
        delete_after_run: bool,
    },

    /// List schedule definitions
    List,

    /// Disable a definition
    Pause {
        /// Definition ID
        id: String,
    },

    /// Re-enable a definition
    Resume {
        /// Definition ID
        id: String,
    },

    /// Delete a definition
    Remove {
        /// Definition ID
        id: String,
    },

    /// Show engine summary
    Status,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum PriorityArg {
    Low,
    Normal,
    High,
}

impl From<PriorityArg> for JobPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => JobPriority::Low,
            PriorityArg::Normal => JobPriority::Normal,
            PriorityArg::High => JobPriority::High,
        }
    }
}
