//! HTTP client for the catalog API and export host

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{header, Client, Response};
use std::time::Duration;

use crate::config::CatalogConfig;
use crate::media::MediaKind;

/// Thin wrapper around `reqwest` that knows the catalog's URL layout.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    token: String,
    api_base: String,
    exports_base: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("tmdb-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            token: config.read_access_token.clone(),
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            exports_base: config.exports_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `{api}/movie/{id}?append_to_response=…` or the `/tv/` equivalent.
    pub fn detail_url(&self, kind: MediaKind, id: i64) -> String {
        format!(
            "{}/{}/{}?append_to_response={}",
            self.api_base,
            kind.api_segment(),
            id,
            kind.append_to_response()
        )
    }

    pub fn detail_urls(&self, kind: MediaKind, ids: &[i64]) -> Vec<String> {
        ids.iter().map(|id| self.detail_url(kind, *id)).collect()
    }

    /// One page of the changes feed for `[start, end]`.
    pub fn changes_url(&self, kind: MediaKind, start: NaiveDate, end: NaiveDate, page: u32) -> String {
        format!(
            "{}/{}/changes?start_date={}&end_date={}&page={}",
            self.api_base,
            kind.api_segment(),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            page
        )
    }

    /// `{exports}/movie_ids_MM_DD_YYYY.json.gz` and the series equivalent.
    pub fn export_url(&self, kind: MediaKind, date: NaiveDate) -> String {
        format!("{}/{}", self.exports_base, export_file_name(kind, date))
    }

    /// Authenticated GET against the catalog API.
    pub async fn get(&self, url: &str) -> reqwest::Result<Response> {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
    }

    /// Unauthenticated GET against the export host.
    pub async fn get_export(&self, url: &str) -> reqwest::Result<Response> {
        self.http.get(url).send().await?.error_for_status()
    }
}

pub fn export_file_name(kind: MediaKind, date: NaiveDate) -> String {
    format!("{}_{}.json.gz", kind.export_prefix(), date.format("%m_%d_%Y"))
}
