//! Nightly ID export files
//!
//! The export host publishes one gzip-compressed NDJSON file per media kind
//! and day. Today's file may not exist yet, so the file dated yesterday (UTC)
//! is used.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use flate2::read::GzDecoder;
use futures::StreamExt;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::client::{export_file_name, CatalogClient};
use crate::media::MediaKind;

/// One line of an export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExportEntry {
    pub id: i64,
    #[serde(default)]
    pub adult: bool,
}

/// Date of the newest export guaranteed to be published at `now`.
pub fn export_date(now: DateTime<Utc>) -> NaiveDate {
    (now - Duration::days(1)).date_naive()
}

/// Decode a gzip NDJSON stream. Blank lines are ignored; malformed lines are
/// logged and skipped.
pub fn parse_export<R: Read>(reader: R) -> Result<Vec<ExportEntry>> {
    let decoder = BufReader::new(GzDecoder::new(reader));
    let mut entries = Vec::new();
    let mut malformed = 0usize;

    for (line_no, line) in decoder.lines().enumerate() {
        let line = line.context("Failed to read export line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ExportEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                malformed += 1;
                debug!(line = line_no + 1, error = %e, "Skipping malformed export line");
            },
        }
    }

    if malformed > 0 {
        warn!(malformed, parsed = entries.len(), "Export contained malformed lines");
    }

    Ok(entries)
}

/// IDs from an export, optionally keeping adult entries.
pub fn export_ids(entries: &[ExportEntry], include_adult: bool) -> Vec<i64> {
    entries
        .iter()
        .filter(|e| include_adult || !e.adult)
        .map(|e| e.id)
        .collect()
}

/// Stream the export for `kind` into `dir`, returning the file path.
pub async fn download_export(
    client: &CatalogClient,
    kind: MediaKind,
    date: NaiveDate,
    dir: &Path,
) -> Result<PathBuf> {
    let url = client.export_url(kind, date);
    let path = dir.join(export_file_name(kind, date));

    info!(kind = %kind, url = %url, "Downloading ID export");

    let response = client
        .get_export(&url)
        .await
        .with_context(|| format!("Failed to download export {url}"))?;

    let mut file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut stream = response.bytes_stream();
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read export body")?;
        written += chunk.len();
        file.write_all(&chunk).await.context("Failed to write export file")?;
    }
    file.flush().await.context("Failed to flush export file")?;

    debug!(kind = %kind, bytes = written, path = %path.display(), "Export downloaded");
    Ok(path)
}

/// Parse an export file previously written by [`download_export`].
pub async fn read_export_file(path: &Path) -> Result<Vec<ExportEntry>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        parse_export(file)
    })
    .await
    .context("Export parser task failed")?
}

/// Download and parse an export without touching the filesystem.
pub async fn fetch_export(
    client: &CatalogClient,
    kind: MediaKind,
    date: NaiveDate,
) -> Result<Vec<ExportEntry>> {
    let url = client.export_url(kind, date);
    info!(kind = %kind, url = %url, "Fetching ID export");

    let bytes = client
        .get_export(&url)
        .await
        .with_context(|| format!("Failed to download export {url}"))?
        .bytes()
        .await
        .context("Failed to read export body")?;

    tokio::task::spawn_blocking(move || parse_export(bytes.as_ref()))
        .await
        .context("Export parser task failed")?
}
