//! # Genflow Store
//!
//! Durable keyed storage for the generation job queue and schedule engine.
//!
//! Three collections live here:
//!
//! - **Jobs**: every submitted unit of work, never deleted
//! - **Schedule definitions**: recipes that produce jobs on a trigger
//! - **Execution history**: append-only audit of finished runs
//!
//! All other components read and write exclusively through [`JobStore`],
//! which is what makes restart recovery possible.

pub mod definition;
pub mod error;
pub mod history;
pub mod job;
mod schema;
pub mod sqlite;
pub mod store;

pub use definition::{DefinitionPatch, DefinitionSpec, RunState, RunStatus, ScheduleDefinition, Trigger};
pub use error::StoreError;
pub use history::ExecutionRecord;
pub use job::{Job, JobPriority, JobSpec, JobStatus};
pub use sqlite::SqliteJobStore;
pub use store::{JobStore, MemoryJobStore};
