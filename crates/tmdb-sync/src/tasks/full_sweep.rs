//! Full catalog replacement through the staging pipeline

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::TaskContext;
use crate::db;
use crate::staging::{StagingPipeline, SweepOutcome};
use crate::watermark::{self, Watermark};

pub async fn run(ctx: &TaskContext, force: bool) -> Result<SweepOutcome> {
    info!(force, "Running full sweep");
    ctx.announce("Running scheduled full sweep.").await;

    let pipeline = StagingPipeline::new(ctx.pool.clone(), Arc::clone(&ctx.engine), ctx.staging.clone());
    let outcome = pipeline.run(force).await?;

    match &outcome {
        SweepOutcome::Promoted { fetch, rows_loaded } => {
            watermark::set(&ctx.pool, Watermark::LastFullSweep, Utc::now())
                .await
                .context("Failed to record full sweep watermark")?;

            if ctx.enable_unaccent {
                if let Err(e) = db::ensure_unaccent(&ctx.pool).await {
                    warn!(error = %format!("{e:#}"), "Failed to recreate unaccent extension");
                }
            }

            info!(
                ingested = fetch.ingested,
                failed = fetch.failed,
                rows_loaded,
                "Full sweep completed"
            );
            ctx.announce("Scheduled full sweep completed.").await;
        },
        SweepOutcome::Aborted { table, production, staging } => {
            error!(table, production, staging, "Full sweep aborted, production left untouched");
            ctx.announce(&format!(
                "Full sweep aborted: {table} staged {staging} rows against {production} in production."
            ))
            .await;
        },
    }

    Ok(outcome)
}
