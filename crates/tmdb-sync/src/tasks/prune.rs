//! Remove local items absent from the latest exports

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use tracing::info;

use super::TaskContext;
use crate::catalog::exports::{export_date, export_ids, fetch_export};
use crate::ingest::{delete_media_items, local_ids};
use crate::media::MediaKind;

/// Local IDs the export no longer lists, sorted.
pub fn stale_ids(local: &HashSet<i64>, export: &HashSet<i64>) -> Vec<i64> {
    let mut stale: Vec<i64> = local.difference(export).copied().collect();
    stale.sort_unstable();
    stale
}

/// Returns the number of roots deleted.
///
/// Adult entries count as present. Both exports are downloaded and checked
/// before anything is deleted; an export without IDs aborts the prune.
pub async fn run(ctx: &TaskContext) -> Result<u64> {
    info!("Running prune");
    ctx.announce("Running scheduled prune task.").await;

    let date = export_date(Utc::now());
    let client = ctx.engine.client();

    let mut exports = Vec::with_capacity(MediaKind::ALL.len());
    for kind in MediaKind::ALL {
        let entries = fetch_export(client, kind, date).await?;
        let ids: HashSet<i64> = export_ids(&entries, true).into_iter().collect();
        if ids.is_empty() {
            bail!("The {kind} export for {date} contains no ids, refusing to prune");
        }
        exports.push((kind, ids));
    }

    let mut deleted = 0;
    for (kind, exported) in exports {
        let local = local_ids(&ctx.pool, kind)
            .await
            .with_context(|| format!("Failed to load local {kind} ids"))?;
        let stale = stale_ids(&local, &exported);

        info!(kind = %kind, local = local.len(), exported = exported.len(), stale = stale.len(), "Computed stale ids");
        if stale.is_empty() {
            continue;
        }

        let removed = delete_media_items(&ctx.pool, kind, &stale)
            .await
            .with_context(|| format!("Failed to delete stale {kind} items"))?;
        info!(kind = %kind, removed, "Pruned stale items");
        deleted += removed;
    }

    ctx.announce("Scheduled prune task completed.").await;
    Ok(deleted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_ids() {
        let local: HashSet<i64> = [1, 2, 3, 9].into_iter().collect();
        let export: HashSet<i64> = [2, 3, 4].into_iter().collect();
        assert_eq!(stale_ids(&local, &export), vec![1, 9]);
    }
}
