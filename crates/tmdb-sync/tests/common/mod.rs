//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::Utc;
use flate2::{write::GzEncoder, Compression};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tmdb_sync::catalog::client::export_file_name;
use tmdb_sync::catalog::exports::export_date;
use tmdb_sync::catalog::CatalogClient;
use tmdb_sync::config::{CatalogConfig, StagingConfig, SyncPolicy};
use tmdb_sync::fetch::{FetchEngine, FetchSettings};
use tmdb_sync::ingest::MediaGraph;
use tmdb_sync::notify::Notifier;
use tmdb_sync::tasks::TaskContext;
use tmdb_sync::MediaKind;

/// Client whose API and export hosts both point at `base`.
pub fn client_for(base: &str) -> CatalogClient {
    CatalogClient::new(&CatalogConfig {
        read_access_token: "test-token".to_string(),
        api_base_url: format!("{base}/3"),
        exports_base_url: format!("{base}/p/exports"),
        request_timeout_secs: 5,
    })
    .unwrap()
}

/// Fast engine settings: no pacing to speak of and short retry delays.
pub fn fast_settings(max_retries: u32) -> FetchSettings {
    FetchSettings {
        rate_limit: 10_000.0,
        max_connections: 4,
        max_retries,
        retry_delay: Duration::from_millis(10),
        batch_size: 2,
    }
}

pub fn engine_for(base: &str) -> Arc<FetchEngine> {
    Arc::new(FetchEngine::new(client_for(base), fast_settings(3)))
}

pub fn movie_json(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "release_date": "1999-10-15",
        "genres": [{"id": 18, "name": "Drama"}, {"id": 53, "name": "Thriller"}],
        "credits": {"cast": [{"id": 819, "name": "Edward Norton", "order": 0}]},
        "keywords": {"keywords": [{"id": 825, "name": "support group"}]},
        "belongs_to_collection": {"id": 10, "name": "Collected Films", "poster_path": null, "backdrop_path": null},
        "production_companies": [{"id": 508, "name": "Regency Enterprises", "origin_country": "US", "logo_path": null}],
        "production_countries": [{"iso_3166_1": "US", "name": "United States of America"}],
        "spoken_languages": [{"iso_639_1": "en", "english_name": "English", "name": "English"}],
        "alternative_titles": {"titles": [
            {"iso_3166_1": "FR", "title": format!("{title} (FR)"), "type": ""},
            {"iso_3166_1": "DE", "title": format!("{title} (DE)"), "type": "working title"}
        ]},
        "release_dates": {"results": [{
            "iso_3166_1": "US",
            "release_dates": [
                {"certification": "R", "release_date": "1999-10-15T00:00:00.000Z", "type": 3, "note": ""}
            ]
        }]},
        "videos": {"results": [{
            "id": format!("video-{id}"), "iso_639_1": "en", "iso_3166_1": "US", "name": "Trailer",
            "key": "abc", "site": "YouTube", "size": 1080, "type": "Trailer", "official": true,
            "published_at": "2014-01-01T00:00:00.000Z"
        }]},
        "external_ids": {"imdb_id": format!("tt{id:07}")}
    })
}

pub fn series_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "first_air_date": "2011-04-17",
        "genres": [{"id": 18, "name": "Drama"}],
        "networks": [{"id": 49, "name": "HBO"}],
        "seasons": [{"id": id * 10, "season_number": 1, "episode_count": 10}]
    })
}

pub fn movie(id: i64) -> MediaGraph {
    MediaGraph::from_value(MediaKind::Movie, movie_json(id, &format!("Movie {id}"))).unwrap()
}

pub fn series(id: i64) -> MediaGraph {
    MediaGraph::from_value(MediaKind::Series, series_json(id, &format!("Series {id}"))).unwrap()
}

/// Task context against a mock catalog at `base`, with notifications off.
pub fn task_context(pool: PgPool, base: &str) -> TaskContext {
    TaskContext {
        pool,
        engine: engine_for(base),
        notifier: Notifier::disabled(),
        sync: SyncPolicy::default(),
        staging: StagingConfig::default(),
        enable_unaccent: false,
    }
}

pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Serve today's export of `kind` with the given NDJSON lines.
pub async fn mount_export(server: &MockServer, kind: MediaKind, lines: &str) {
    let file = export_file_name(kind, export_date(Utc::now()));
    Mock::given(method("GET"))
        .and(path(format!("/p/exports/{file}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(lines)))
        .mount(server)
        .await;
}

pub async fn count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}
