//! Staging-table bulk load for the full sweep
//!
//! ```text
//! ID exports ─▶ fetch (chunks) ─▶ CSV row-sets ─▶ COPY staging_* ─▶ safety check
//!                                                                     │
//!                                     abort: drop staging ◀───────────┤
//!                                     pass:  rename staging_t → t ◀───┘
//! ```
//!
//! Production tables are only ever replaced by a single rename transaction,
//! so readers see either the old catalog or the new one.

pub mod pipeline;
pub mod rowsets;
pub mod safety;
pub mod scripts;

use thiserror::Error;

use crate::fetch::FetchSummary;

pub use pipeline::StagingPipeline;
pub use rowsets::{RowSetFile, RowSetWriter};

/// Result type for staging operations
pub type Result<T> = std::result::Result<T, StagingError>;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How a full sweep ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// Staging tables replaced production.
    Promoted { fetch: FetchSummary, rows_loaded: u64 },
    /// Staging shrank too much against production; nothing was replaced.
    Aborted {
        table: &'static str,
        production: i64,
        staging: i64,
    },
}

impl SweepOutcome {
    pub fn is_promoted(&self) -> bool {
        matches!(self, SweepOutcome::Promoted { .. })
    }
}
