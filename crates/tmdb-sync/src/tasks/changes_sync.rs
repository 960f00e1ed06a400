//! Incremental sync from the changes feed

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use super::TaskContext;
use crate::catalog::changes::{fetch_changed_ids, plan_windows, should_skip, sync_window_start};
use crate::fetch::FetchSummary;
use crate::ingest::IngestSink;
use crate::media::MediaKind;
use crate::watermark::{self, Watermark};

/// Returns `None` when skipped because a full sweep ran within the grace period.
pub async fn run(ctx: &TaskContext) -> Result<Option<FetchSummary>> {
    let now = Utc::now();
    let policy = &ctx.sync;

    let last_full = watermark::get(&ctx.pool, Watermark::LastFullSweep)
        .await
        .context("Failed to read full sweep watermark")?;
    if should_skip(last_full, now, policy) {
        info!(
            grace_hours = policy.full_sweep_grace_hours,
            "Skipping changes sync, a full sweep ran recently"
        );
        return Ok(None);
    }

    let last_changes = watermark::get(&ctx.pool, Watermark::LastChangesSync)
        .await
        .context("Failed to read changes sync watermark")?;
    let start = sync_window_start(last_changes, last_full, now, policy);
    let windows = plan_windows(start.date_naive(), now.date_naive(), policy);
    info!(start = %start, windows = windows.len(), "Running changes sync");

    let client = ctx.engine.client();
    let mut sink = IngestSink::new(ctx.pool.clone());
    let mut total = FetchSummary::default();

    for kind in MediaKind::ALL {
        let ids: Vec<i64> = fetch_changed_ids(&ctx.engine, kind, &windows, policy.max_pages)
            .await?
            .into_iter()
            .collect();
        if ids.is_empty() {
            continue;
        }

        let urls = client.detail_urls(kind, &ids);
        let label = format!("Changes sync {kind}");
        let summary = ctx
            .engine
            .fetch_and_process(urls, kind, &label, &mut sink)
            .await
            .with_context(|| format!("Failed to ingest changed {kind} items"))?;
        total.merge(summary);
    }

    watermark::set(&ctx.pool, Watermark::LastChangesSync, now)
        .await
        .context("Failed to record changes sync watermark")?;

    info!(ingested = total.ingested, failed = total.failed, tombstoned = total.tombstoned, "Changes sync completed");
    ctx.announce("Changes sync completed.").await;
    Ok(Some(total))
}
