//! # Genflow Queue
//!
//! Admission, ordering and bounded execution of generation jobs.
//!
//! ## Features
//!
//! - Priority ordering (high before low, FIFO within a priority)
//! - Worker pool with a fixed number of concurrent slots
//! - Write-through persistence via [`genflow_store::JobStore`]
//! - Lifecycle events with sync or deferred handlers
//! - Append-only execution history

pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod manager;
pub mod worker;

pub use config::QueueConfig;
pub use error::QueueError;
pub use event::{EventBus, HandlerResult, QueueEvent, QueueEventKind};
pub use generator::Generator;
pub use manager::{QueueManager, QueueSnapshot, QueueStats};
pub use worker::WorkerPool;
