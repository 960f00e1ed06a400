//! TMDB Jobs CLI Library
//!
//! Producer for the sync worker's job queue: validates a job on the command
//! line and inserts it into `job_queue`, where the insert trigger wakes the
//! worker.

pub mod error;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use tmdb_sync::config::DEFAULT_DATABASE_URL;
use tmdb_sync::jobs::{JobKind, JobStore};

/// tmdb-jobs - enqueue work for the TMDB sync worker
#[derive(Parser, Debug)]
#[command(name = "tmdb-jobs")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database holding the job queue
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database_url: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Insert a job into the queue
    Enqueue {
        /// full_sweep, missing_ids, prune_deleted, changes_sync, create_tables, add_movie or add_series
        #[arg(value_parser = parse_kind)]
        kind: JobKind,

        /// Catalog ID (add_movie and add_series only)
        #[arg(long)]
        id: Option<i64>,

        /// Promote a full sweep regardless of row counts
        #[arg(long)]
        force: bool,
    },

    /// Print the number of pending jobs
    Pending,
}

fn parse_kind(value: &str) -> std::result::Result<JobKind, String> {
    value.parse().map_err(|e: tmdb_sync::jobs::JobStoreError| e.to_string())
}

/// Payload stored with a job, checked against the flags given.
pub fn build_payload(kind: JobKind, id: Option<i64>, force: bool) -> Result<Option<String>> {
    if force && kind != JobKind::FullSweep {
        return Err(CliError::InvalidArguments(format!(
            "--force only applies to full_sweep, not {kind}"
        )));
    }

    match (kind.item_kind(), id) {
        (Some(_), Some(id)) if id > 0 => Ok(Some(id.to_string())),
        (Some(_), Some(id)) => Err(CliError::InvalidArguments(format!(
            "--id must be a positive integer, got {id}"
        ))),
        (Some(_), None) => Err(CliError::InvalidArguments(format!("--id is required for {kind}"))),
        (None, Some(_)) => Err(CliError::InvalidArguments(format!(
            "--id only applies to add_movie and add_series, not {kind}"
        ))),
        (None, None) if force => Ok(Some("true".to_string())),
        (None, None) => Ok(None),
    }
}

async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Execute the parsed command
pub async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Enqueue { kind, id, force } => {
            let payload = build_payload(*kind, *id, *force)?;
            let store = JobStore::new(connect(&cli.database_url).await?);
            let job_id = store.enqueue(*kind, payload.as_deref()).await?;

            info!(job_id, kind = %kind, "Job enqueued");
            println!("Enqueued {kind} as job {job_id}");
        },
        Commands::Pending => {
            let store = JobStore::new(connect(&cli.database_url).await?);
            let pending = store.pending_count().await?;
            println!("{pending}");
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_jobs_need_positive_id() {
        assert_eq!(build_payload(JobKind::AddMovie, Some(550), false).unwrap(), Some("550".into()));
        assert!(build_payload(JobKind::AddSeries, None, false).is_err());
        assert!(build_payload(JobKind::AddSeries, Some(0), false).is_err());
    }

    #[test]
    fn test_force_only_for_full_sweep() {
        assert_eq!(build_payload(JobKind::FullSweep, None, true).unwrap(), Some("true".into()));
        assert_eq!(build_payload(JobKind::FullSweep, None, false).unwrap(), None);
        assert!(build_payload(JobKind::PruneDeleted, None, true).is_err());
    }

    #[test]
    fn test_id_rejected_for_global_jobs() {
        assert!(build_payload(JobKind::ChangesSync, Some(5), false).is_err());
    }

    #[test]
    fn test_cli_parses_enqueue() {
        let cli = Cli::try_parse_from(["tmdb-jobs", "enqueue", "add_movie", "--id", "603"]).unwrap();
        match cli.command {
            Commands::Enqueue { kind, id, force } => {
                assert_eq!(kind, JobKind::AddMovie);
                assert_eq!(id, Some(603));
                assert!(!force);
            },
            Commands::Pending => panic!("expected enqueue"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["tmdb-jobs", "enqueue", "reindex"]).is_err());
    }
}
