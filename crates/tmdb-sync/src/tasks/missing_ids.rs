//! Ingest items present in the exports but missing locally

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use tracing::info;

use super::TaskContext;
use crate::catalog::exports::{export_date, export_ids, fetch_export};
use crate::fetch::FetchSummary;
use crate::ingest::{local_ids, IngestSink};
use crate::media::MediaKind;

/// Export IDs not stored locally, in export order.
pub fn missing_ids(export: &[i64], local: &HashSet<i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    export
        .iter()
        .copied()
        .filter(|id| !local.contains(id) && seen.insert(*id))
        .collect()
}

pub async fn run(ctx: &TaskContext) -> Result<FetchSummary> {
    info!("Running missing IDs sweep");
    ctx.announce("Running scheduled missing IDs sweep.").await;

    let date = export_date(Utc::now());
    let client = ctx.engine.client();
    let mut sink = IngestSink::new(ctx.pool.clone());
    let mut total = FetchSummary::default();

    for kind in MediaKind::ALL {
        let entries = fetch_export(client, kind, date).await?;
        let local = local_ids(&ctx.pool, kind)
            .await
            .with_context(|| format!("Failed to load local {kind} ids"))?;
        let missing = missing_ids(&export_ids(&entries, false), &local);

        info!(kind = %kind, exported = entries.len(), local = local.len(), missing = missing.len(), "Computed missing ids");
        if missing.is_empty() {
            continue;
        }

        let urls = client.detail_urls(kind, &missing);
        let label = format!("Missing {kind} ids");
        let summary = ctx
            .engine
            .fetch_and_process(urls, kind, &label, &mut sink)
            .await
            .with_context(|| format!("Failed to ingest missing {kind} ids"))?;
        total.merge(summary);
    }

    info!(ingested = total.ingested, failed = total.failed, tombstoned = total.tombstoned, "Missing IDs sweep completed");
    ctx.announce("Scheduled missing IDs sweep completed.").await;
    Ok(total)
}
