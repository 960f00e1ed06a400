//! Batch sink that persists every body directly

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, warn};

use super::{delete_media_items, persist, MediaGraph};
use crate::fetch::BatchSink;
use crate::media::MediaKind;

/// Writes each fetched item in its own transaction.
///
/// A failing item is logged and skipped; the rest of the batch continues.
pub struct IngestSink {
    pool: PgPool,
}

impl IngestSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchSink for IngestSink {
    async fn process_batch(&mut self, kind: MediaKind, bodies: Vec<Value>) -> anyhow::Result<usize> {
        let mut stored = 0;

        for body in bodies {
            let graph = match MediaGraph::from_value(kind, body) {
                Ok(graph) => graph,
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Skipping undecodable payload");
                    continue;
                },
            };

            match persist(&self.pool, &graph).await {
                Ok(()) => stored += 1,
                Err(e) => warn!(kind = %kind, id = graph.id(), error = %e, "Failed to persist item"),
            }
        }

        debug!(kind = %kind, stored, "Batch persisted");
        Ok(stored)
    }

    async fn delete_tombstones(&mut self, kind: MediaKind, ids: Vec<i64>) -> anyhow::Result<u64> {
        Ok(delete_media_items(&self.pool, kind, &ids).await?)
    }
}
