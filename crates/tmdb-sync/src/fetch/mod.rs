//! Rate-limited concurrent fetch engine
//!
//! [`FetchEngine::fetch_and_process`] downloads detail payloads with a bounded
//! number of in-flight requests, paces completions, retries transient
//! failures and records 404s as tombstones. Bodies are handed to a
//! [`BatchSink`] in batches; tombstones are handed over once, after the run.

pub mod engine;
pub mod pacing;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

use crate::media::MediaKind;

pub use engine::{FetchEngine, FetchSettings};
pub use pacing::Pacer;

/// Consumer of fetched bodies.
#[async_trait]
pub trait BatchSink: Send {
    /// Handle one batch of detail bodies, returning how many were accepted.
    ///
    /// Per-item failures are the sink's to log; an `Err` aborts the run.
    async fn process_batch(&mut self, kind: MediaKind, bodies: Vec<Value>) -> anyhow::Result<usize>;

    /// Remove items whose detail endpoint answered 404.
    async fn delete_tombstones(&mut self, kind: MediaKind, ids: Vec<i64>) -> anyhow::Result<u64>;
}

/// Result of a single detail request after retries.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(Value),
    NotFound,
    Failed,
}

/// Counters for one `fetch_and_process` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub requested: usize,
    pub ingested: usize,
    pub tombstoned: usize,
    pub failed: usize,
}

impl FetchSummary {
    pub fn merge(&mut self, other: FetchSummary) {
        self.requested += other.requested;
        self.ingested += other.ingested;
        self.tombstoned += other.tombstoned;
        self.failed += other.failed;
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Invalid JSON body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}

fn media_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"/(?:movie|tv)/(\d+)").expect("media id pattern is valid")
    })
}

/// Extract the numeric catalog ID from a detail URL.
pub fn extract_media_id(url: &str) -> Option<i64> {
    media_id_pattern()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
