//! Fetch engine implementation

use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::{extract_media_id, BatchSink, FetchError, FetchOutcome, FetchSummary, Pacer};
use crate::catalog::CatalogClient;
use crate::config::FetchConfig;
use crate::media::MediaKind;

/// Completions between two progress log lines.
pub const PROGRESS_LOG_INTERVAL: usize = 1_000;

/// Tuning for one [`FetchEngine`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Completions per second across the whole run.
    pub rate_limit: f64,
    pub max_connections: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub batch_size: usize,
}

impl FetchSettings {
    /// The per-connection rate limit is scaled by the connection count.
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            rate_limit: config.rate_limit * config.max_connections as f64,
            max_connections: config.max_connections,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            batch_size: config.batch_size,
        }
    }
}

/// Cheap to clone; clones share the client and the connection semaphore.
#[derive(Clone)]
pub struct FetchEngine {
    client: Arc<CatalogClient>,
    settings: FetchSettings,
    semaphore: Arc<Semaphore>,
}

impl FetchEngine {
    pub fn new(client: CatalogClient, settings: FetchSettings) -> Self {
        let permits = settings.max_connections.max(1);
        Self {
            client: Arc::new(client),
            settings,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn client(&self) -> &CatalogClient {
        &self.client
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// One request, holding a connection permit only while it is in flight.
    async fn attempt(&self, url: &str) -> Result<Option<Value>, FetchError> {
        let _permit = self.semaphore.acquire().await.ok();

        let response = self.client.get(url).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let body = response.json::<Value>().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        Ok(Some(body))
    }

    /// Fetch a single URL with the retry policy.
    ///
    /// 404 is returned immediately as [`FetchOutcome::NotFound`]; every other
    /// failure is retried with a fixed delay until the attempt cap.
    pub async fn fetch_one(&self, url: &str) -> FetchOutcome {
        let max_attempts = self.settings.max_retries.max(1);

        for attempt in 1..=max_attempts {
            match self.attempt(url).await {
                Ok(Some(body)) => return FetchOutcome::Found(body),
                Ok(None) => return FetchOutcome::NotFound,
                Err(e) if attempt < max_attempts => {
                    warn!(url, attempt, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.settings.retry_delay).await;
                },
                Err(e) => {
                    error!(url, attempts = attempt, error = %e, "Giving up on request");
                },
            }
        }

        FetchOutcome::Failed
    }

    /// Fetch every URL and stream the bodies into `sink`.
    pub async fn fetch_and_process<S>(
        &self,
        urls: Vec<String>,
        kind: MediaKind,
        label: &str,
        sink: &mut S,
    ) -> Result<FetchSummary, FetchError>
    where
        S: BatchSink + ?Sized,
    {
        let total = urls.len();
        let mut summary = FetchSummary {
            requested: total,
            ..FetchSummary::default()
        };

        if total == 0 {
            return Ok(summary);
        }

        info!(label, kind = %kind, total, "Starting fetch run");

        let batch_size = self.settings.batch_size.max(1);
        let pacer = Pacer::new(self.settings.rate_limit);
        let started = Instant::now();
        let mut batch: Vec<Value> = Vec::with_capacity(batch_size.min(total));
        let mut tombstones: Vec<i64> = Vec::new();
        let mut completed = 0usize;

        // Each request future owns an engine handle so the stream borrows nothing.
        let engine = self.clone();
        let mut results = stream::iter(urls)
            .map(move |url| {
                let engine = engine.clone();
                async move {
                    let outcome = engine.fetch_one(&url).await;
                    (url, outcome)
                }
            })
            .buffer_unordered(self.settings.max_connections.max(1));

        while let Some((url, outcome)) = results.next().await {
            completed += 1;
            pacer.wait(completed).await;

            match outcome {
                FetchOutcome::Found(body) => {
                    batch.push(body);
                    if batch.len() >= batch_size {
                        let bodies = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                        summary.ingested += sink.process_batch(kind, bodies).await?;
                    }
                },
                FetchOutcome::NotFound => match extract_media_id(&url) {
                    Some(id) => tombstones.push(id),
                    None => {
                        warn!(url = %url, "404 from a URL without a media id");
                        summary.failed += 1;
                    },
                },
                FetchOutcome::Failed => summary.failed += 1,
            }

            if completed % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    label,
                    completed,
                    total,
                    elapsed_secs = started.elapsed().as_secs(),
                    "Fetch progress"
                );
            }
        }

        if !batch.is_empty() {
            summary.ingested += sink.process_batch(kind, batch).await?;
        }

        summary.tombstoned = tombstones.len();
        if !tombstones.is_empty() {
            let deleted = sink.delete_tombstones(kind, tombstones).await?;
            info!(label, kind = %kind, tombstoned = summary.tombstoned, deleted, "Processed tombstones");
        }

        info!(
            label,
            kind = %kind,
            requested = summary.requested,
            ingested = summary.ingested,
            tombstoned = summary.tombstoned,
            failed = summary.failed,
            elapsed_secs = started.elapsed().as_secs(),
            "Fetch run complete"
        );

        Ok(summary)
    }
}
