//! Error types for the job producer CLI

use thiserror::Error;
use tmdb_sync::jobs::JobStoreError;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Flags that do not fit the job kind
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Database error: {0}. Check DATABASE_URL and that the database is reachable.")]
    Database(#[from] sqlx::Error),

    #[error("Job queue error: {0}")]
    JobStore(#[from] JobStoreError),
}
