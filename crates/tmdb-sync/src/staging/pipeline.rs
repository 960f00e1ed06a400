//! Full-sweep staging pipeline

use anyhow::Context;
use chrono::Utc;
use sqlx::{Executor, PgConnection, PgPool};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::safety::{self, SafetyVerdict};
use super::scripts;
use super::{Result, RowSetFile, RowSetWriter, StagingError, SweepOutcome};
use crate::catalog::exports::{self, export_date};
use crate::config::StagingConfig;
use crate::fetch::{FetchEngine, FetchSummary};
use crate::ingest::tables::{self, TableSpec};
use crate::media::MediaKind;

const COPY_BUFFER_BYTES: usize = 1 << 20;

/// Delete `dir` if present and create it empty.
pub async fn prepare_working_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {},
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

pub async fn create_staging_tables(pool: &PgPool) -> Result<()> {
    let sql = scripts::create_staging_script(tables::all_tables());
    sqlx::raw_sql(&sql).execute(pool).await?;
    Ok(())
}

pub async fn drop_staging_tables(pool: &PgPool) -> Result<()> {
    let sql = scripts::drop_staging_script(tables::all_tables());
    sqlx::raw_sql(&sql).execute(pool).await?;
    Ok(())
}

async fn copy_file(conn: &mut PgConnection, file: &RowSetFile) -> Result<u64> {
    let mut source = tokio::fs::File::open(&file.path).await?;
    let mut copy = conn.copy_in_raw(&scripts::copy_statement(file.table)).await?;
    let mut buf = vec![0u8; COPY_BUFFER_BYTES];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                copy.abort(e.to_string()).await?;
                return Err(StagingError::Io(e));
            },
        };
        if n == 0 {
            break;
        }
        copy.send(&buf[..n]).await?;
    }

    Ok(copy.finish().await?)
}

/// `COPY` every row-set into its staging table in one transaction.
pub async fn load_row_sets(pool: &PgPool, files: &[RowSetFile]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut loaded = 0;

    for file in files.iter().filter(|f| f.rows > 0) {
        let rows = copy_file(&mut tx, file).await?;
        info!(table = file.table.name, rows, "Loaded staging table");
        loaded += rows;
    }

    tx.commit().await?;
    Ok(loaded)
}

/// Swap every staging table into production, then drop the superseded tables.
pub async fn promote(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;
    (&mut *tx)
        .execute(sqlx::raw_sql(&scripts::promote_script(tables::all_tables())))
        .await?;
    tx.commit().await?;

    sqlx::raw_sql(&scripts::drop_old_script(tables::all_tables()))
        .execute(pool)
        .await?;
    Ok(())
}

/// Staged replacement of the whole catalog.
pub struct StagingPipeline {
    pool: PgPool,
    engine: Arc<FetchEngine>,
    config: StagingConfig,
}

impl StagingPipeline {
    pub fn new(pool: PgPool, engine: Arc<FetchEngine>, config: StagingConfig) -> Self {
        Self { pool, engine, config }
    }

    /// Run a full sweep. `force` skips the safety check.
    ///
    /// The working directory is recreated at the start and removed at the
    /// end, whatever the outcome.
    pub async fn run(&self, force: bool) -> anyhow::Result<SweepOutcome> {
        let dir = self.config.working_dir.clone();
        prepare_working_dir(&dir)
            .await
            .with_context(|| format!("Failed to prepare working directory {}", dir.display()))?;

        let result = self.run_in(&dir, force).await;

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            warn!(dir = %dir.display(), error = %e, "Failed to remove working directory");
        }
        result
    }

    async fn run_in(&self, dir: &Path, force: bool) -> anyhow::Result<SweepOutcome> {
        let started = Instant::now();
        let date = export_date(Utc::now());
        let client = self.engine.client();

        let mut writer = RowSetWriter::new(dir);
        let mut fetch = FetchSummary::default();

        for kind in MediaKind::ALL {
            let path = exports::download_export(client, kind, date, dir).await?;
            let entries = exports::read_export_file(&path).await?;
            let ids = exports::export_ids(&entries, false);
            info!(kind = %kind, ids = ids.len(), date = %date, "Loaded ID export");

            let chunk_size = self.config.id_chunk_size.max(1);
            let chunks = ids.len().div_ceil(chunk_size);
            for (i, chunk) in ids.chunks(chunk_size).enumerate() {
                let label = format!("Full sweep {kind} chunk {}/{chunks}", i + 1);
                let urls = client.detail_urls(kind, chunk);
                let summary = self
                    .engine
                    .fetch_and_process(urls, kind, &label, &mut writer)
                    .await
                    .with_context(|| format!("Failed to stage {kind} chunk {}", i + 1))?;
                fetch.merge(summary);
            }
        }

        let files = writer.finish().context("Failed to finish CSV row-sets")?;
        info!(
            items = fetch.ingested,
            failed = fetch.failed,
            tables = files.len(),
            elapsed_secs = started.elapsed().as_secs(),
            "Row-sets written"
        );

        let outcome = self.load_and_promote(&files, fetch, force).await?;
        info!(promoted = outcome.is_promoted(), elapsed_secs = started.elapsed().as_secs(), "Full sweep finished");
        Ok(outcome)
    }

    /// Load row-sets into fresh staging tables, check them and promote.
    pub async fn load_and_promote(
        &self,
        files: &[RowSetFile],
        fetch: FetchSummary,
        force: bool,
    ) -> Result<SweepOutcome> {
        create_staging_tables(&self.pool).await?;
        let rows_loaded = match load_row_sets(&self.pool, files).await {
            Ok(rows) => rows,
            Err(e) => {
                drop_staging_tables(&self.pool).await?;
                return Err(e);
            },
        };

        if force {
            info!("Forced sweep, skipping safety check");
        } else {
            let roots: [&'static TableSpec; 2] = [&tables::MOVIE, &tables::SERIES];
            let failed = safety::check_roots(&self.pool, &roots, self.config.safety_threshold).await?;

            if let Some((table, SafetyVerdict::Abort { production, staging, shrink })) = failed {
                error!(
                    table = table.name,
                    production,
                    staging,
                    shrink,
                    "Staging collapsed against production, promotion aborted"
                );
                drop_staging_tables(&self.pool).await?;
                return Ok(SweepOutcome::Aborted {
                    table: table.name,
                    production,
                    staging,
                });
            }
        }

        promote(&self.pool).await?;
        info!(rows_loaded, "Staging tables promoted");

        Ok(SweepOutcome::Promoted { fetch, rows_loaded })
    }
}
