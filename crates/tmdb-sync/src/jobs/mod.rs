//! Durable job queue
//!
//! Producers insert rows into `job_queue`; an `AFTER INSERT` trigger publishes
//! the row id on the `new_job` channel. The worker claims a job by deleting
//! its row, so each job is delivered at most once and never retried.

pub mod models;
pub mod store;

use thiserror::Error;

pub use models::{is_forced, parse_item_id, Job, JobKind};
pub use store::{JobStore, NEW_JOB_CHANNEL};

/// Result type for job store operations
pub type Result<T> = std::result::Result<T, JobStoreError>;

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown job kind: {0}")]
    UnknownKind(String),

    #[error("Invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: JobKind, reason: String },
}
