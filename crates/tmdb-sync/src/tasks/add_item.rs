//! Fetch and store a single catalog item

use anyhow::{bail, Context, Result};
use tracing::info;

use super::TaskContext;
use crate::fetch::FetchOutcome;
use crate::ingest::{delete_media_items, persist, MediaGraph};
use crate::media::MediaKind;

/// What happened to the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Stored,
    /// The catalog answered 404; any local copy was removed.
    Removed,
}

pub async fn run(ctx: &TaskContext, kind: MediaKind, id: i64) -> Result<ItemOutcome> {
    info!(kind = %kind, id, "Adding item");
    let url = ctx.engine.client().detail_url(kind, id);

    match ctx.engine.fetch_one(&url).await {
        FetchOutcome::Found(body) => {
            let graph = MediaGraph::from_value(kind, body)?;
            persist(&ctx.pool, &graph)
                .await
                .with_context(|| format!("Failed to store {kind} {id}"))?;
            info!(kind = %kind, id, "Item stored");
            Ok(ItemOutcome::Stored)
        },
        FetchOutcome::NotFound => {
            let deleted = delete_media_items(&ctx.pool, kind, &[id])
                .await
                .with_context(|| format!("Failed to delete {kind} {id}"))?;
            info!(kind = %kind, id, deleted, "Item not found in catalog, removed locally");
            Ok(ItemOutcome::Removed)
        },
        FetchOutcome::Failed => bail!("Failed to fetch {kind} {id} after retries"),
    }
}
