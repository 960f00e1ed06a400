//! Per-table CSV row-sets for the staging load
//!
//! Every decoded item is flattened into its table rows and appended to one
//! header-less CSV file per table. Each table keeps a set of the natural keys
//! already written, so shared lookups (a genre, a cast member) and repeated
//! items land in the file once.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Result;
use crate::fetch::BatchSink;
use crate::ingest::graph::{DedupKey, MediaGraph, TableRows};
use crate::ingest::tables::TableSpec;
use crate::media::MediaKind;

/// A finished CSV file ready for `COPY`.
#[derive(Debug, Clone)]
pub struct RowSetFile {
    pub table: &'static TableSpec,
    pub path: PathBuf,
    pub rows: u64,
}

struct TableWriter {
    table: &'static TableSpec,
    path: PathBuf,
    writer: csv::Writer<File>,
    seen: HashSet<DedupKey>,
    rows: u64,
}

impl TableWriter {
    fn create(table: &'static TableSpec, dir: &Path) -> Result<Self> {
        let path = dir.join(format!("{}.csv", table.name));
        let writer = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        Ok(Self {
            table,
            path,
            writer,
            seen: HashSet::new(),
            rows: 0,
        })
    }

    fn append(&mut self, group: &TableRows<'_>) -> Result<u64> {
        let mut written = 0;
        for row in &group.rows {
            if let Some(key) = row.dedup_key() {
                if !self.seen.insert(key) {
                    continue;
                }
            }
            row.write_csv(&mut self.writer)?;
            written += 1;
        }
        self.rows += written;
        Ok(written)
    }
}

/// [`BatchSink`] that writes rows to CSV instead of the database.
///
/// Tombstones are ignored: an item that no longer exists simply never
/// reaches staging.
pub struct RowSetWriter {
    dir: PathBuf,
    writers: HashMap<&'static str, TableWriter>,
    seen_items: HashSet<(MediaKind, i64)>,
}

impl RowSetWriter {
    /// Row-sets are written into `dir`, which must exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writers: HashMap::new(),
            seen_items: HashSet::new(),
        }
    }

    /// Append one item's rows. Returns `false` when the item was already written.
    pub fn write_graph(&mut self, graph: &MediaGraph) -> Result<bool> {
        if !self.seen_items.insert((graph.kind(), graph.id())) {
            return Ok(false);
        }

        for group in graph.tables() {
            if group.rows.is_empty() {
                continue;
            }
            let writer = match self.writers.get_mut(group.table.name) {
                Some(writer) => writer,
                None => {
                    let writer = TableWriter::create(group.table, &self.dir)?;
                    self.writers.entry(group.table.name).or_insert(writer)
                },
            };
            writer.append(&group)?;
        }
        Ok(true)
    }

    pub fn items_written(&self) -> usize {
        self.seen_items.len()
    }

    /// Flush every file and return them with their row counts.
    pub fn finish(self) -> Result<Vec<RowSetFile>> {
        let mut files = Vec::with_capacity(self.writers.len());
        for (_, mut w) in self.writers {
            w.writer.flush()?;
            files.push(RowSetFile {
                table: w.table,
                path: w.path,
                rows: w.rows,
            });
        }
        files.sort_by_key(|f| f.table.name);
        Ok(files)
    }
}

#[async_trait]
impl BatchSink for RowSetWriter {
    async fn process_batch(&mut self, kind: MediaKind, bodies: Vec<Value>) -> anyhow::Result<usize> {
        let mut written = 0;
        for body in bodies {
            let graph = match MediaGraph::from_value(kind, body) {
                Ok(graph) => graph,
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Skipping undecodable payload");
                    continue;
                },
            };
            if self.write_graph(&graph)? {
                written += 1;
            }
        }
        debug!(kind = %kind, written, "Batch staged to CSV");
        Ok(written)
    }

    async fn delete_tombstones(&mut self, kind: MediaKind, ids: Vec<i64>) -> anyhow::Result<u64> {
        debug!(kind = %kind, count = ids.len(), "Ignoring tombstones during staging");
        Ok(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movie(id: i64, genres: serde_json::Value) -> Value {
        json!({ "id": id, "title": format!("Movie {id}"), "genres": genres })
    }

    #[tokio::test]
    async fn test_shared_lookups_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RowSetWriter::new(dir.path());

        let bodies = vec![
            movie(1, json!([{"id": 18, "name": "Drama"}, {"id": 18, "name": "Drama"}])),
            movie(2, json!([{"id": 18, "name": "Drama"}, {"id": 35, "name": "Comedy"}])),
            movie(1, json!([{"id": 18, "name": "Drama"}])),
        ];
        let written = writer.process_batch(MediaKind::Movie, bodies).await.unwrap();
        assert_eq!(written, 2);

        let files = writer.finish().unwrap();
        let rows = |name: &str| files.iter().find(|f| f.table.name == name).map(|f| f.rows);
        assert_eq!(rows("movie"), Some(2));
        assert_eq!(rows("movie_genres"), Some(2));
        assert_eq!(rows("movie_genres_assoc"), Some(3));

        let genres = std::fs::read_to_string(dir.path().join("movie_genres.csv")).unwrap();
        assert_eq!(genres, "18,Drama\n35,Comedy\n");
    }

    #[tokio::test]
    async fn test_undecodable_body_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RowSetWriter::new(dir.path());

        let written = writer
            .process_batch(MediaKind::Series, vec![json!({"name": "no id"}), json!({"id": 7})])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(writer.delete_tombstones(MediaKind::Series, vec![9]).await.unwrap(), 0);
    }
}
