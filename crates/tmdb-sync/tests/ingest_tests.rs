//! Persistence and watermark integration tests (requires `DATABASE_URL`)

mod common;

use chrono::{TimeZone, Utc};
use serde_json::json;
use sqlx::PgPool;

use common::{count, movie, movie_json, series};
use tmdb_sync::ingest::{delete_media_items, local_ids, persist, MediaGraph};
use tmdb_sync::watermark::{self, Watermark};
use tmdb_sync::MediaKind;

#[sqlx::test(migrations = "../../migrations")]
async fn test_persist_is_idempotent(pool: PgPool) {
    let graph = movie(550);
    persist(&pool, &graph).await.unwrap();
    persist(&pool, &graph).await.unwrap();

    assert_eq!(count(&pool, "movie").await, 1);
    assert_eq!(count(&pool, "movie_genres").await, 2);
    assert_eq!(count(&pool, "movie_genres_assoc").await, 2);
    assert_eq!(count(&pool, "movie_cast_assoc").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_every_child_table_written(pool: PgPool) {
    persist(&pool, &movie(550)).await.unwrap();
    persist(&pool, &movie(550)).await.unwrap();

    for (table, expected) in [
        ("movie_collections", 1),
        ("movie_production_companies", 1),
        ("movie_companies_assoc", 1),
        ("movie_production_countries", 1),
        ("movie_countries_assoc", 1),
        ("movie_spoken_languages", 1),
        ("movie_languages_assoc", 1),
        ("movie_alternative_titles", 2),
        ("movie_release_dates", 1),
        ("movie_videos", 1),
        ("movie_keywords_assoc", 1),
        ("movie_external_ids", 1),
    ] {
        assert_eq!(count(&pool, table).await, expected, "{table}");
    }

    let collection: Option<i64> = sqlx::query_scalar("SELECT belongs_to_collection_id FROM movie WHERE id = 550")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(collection, Some(10));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_reingest_replaces_children(pool: PgPool) {
    persist(&pool, &movie(550)).await.unwrap();
    assert_eq!(count(&pool, "movie_genres_assoc").await, 2);
    assert_eq!(count(&pool, "movie_alternative_titles").await, 2);

    let mut body = movie_json(550, "Fight Club");
    body["genres"] = json!([{"id": 18, "name": "Drama"}]);
    body["alternative_titles"] = json!({"titles": [{"iso_3166_1": "IT", "title": "Fight Club", "type": ""}]});
    body["videos"] = json!({"results": []});
    let trimmed = MediaGraph::from_value(MediaKind::Movie, body).unwrap();
    persist(&pool, &trimmed).await.unwrap();

    assert_eq!(count(&pool, "movie_genres_assoc").await, 1);
    assert_eq!(count(&pool, "movie_alternative_titles").await, 1);
    assert_eq!(count(&pool, "movie_videos").await, 0);
    // Shared lookups outlive the association
    assert_eq!(count(&pool, "movie_genres").await, 2);

    let country: String = sqlx::query_scalar("SELECT iso_3166_1 FROM movie_alternative_titles WHERE movie_id = 550")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(country, "IT");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_shared_lookups_stored_once(pool: PgPool) {
    persist(&pool, &movie(550)).await.unwrap();
    persist(&pool, &movie(551)).await.unwrap();

    assert_eq!(count(&pool, "movie").await, 2);
    assert_eq!(count(&pool, "movie_genres").await, 2);
    assert_eq!(count(&pool, "movie_genres_assoc").await, 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_removes_item_and_keeps_lookups(pool: PgPool) {
    persist(&pool, &movie(550)).await.unwrap();
    persist(&pool, &movie(551)).await.unwrap();

    let deleted = delete_media_items(&pool, MediaKind::Movie, &[550, 9999]).await.unwrap();
    assert_eq!(deleted, 1);

    let remaining = local_ids(&pool, MediaKind::Movie).await.unwrap();
    assert_eq!(remaining.into_iter().collect::<Vec<_>>(), vec![551]);
    assert_eq!(count(&pool, "movie_genres_assoc").await, 2);
    assert_eq!(count(&pool, "movie_external_ids").await, 1);
    assert_eq!(count(&pool, "movie_genres").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_series_roundtrip(pool: PgPool) {
    persist(&pool, &series(1399)).await.unwrap();

    assert_eq!(count(&pool, "series").await, 1);
    assert_eq!(count(&pool, "series_seasons").await, 1);

    delete_media_items(&pool, MediaKind::Series, &[1399]).await.unwrap();
    assert_eq!(count(&pool, "series").await, 0);
    assert_eq!(count(&pool, "series_seasons").await, 0);
    assert_eq!(count(&pool, "series_networks").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_watermark_roundtrip(pool: PgPool) {
    assert!(watermark::get(&pool, Watermark::LastFullSweep).await.unwrap().is_none());

    let first = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2025, 1, 2, 3, 0, 0).unwrap();
    watermark::set(&pool, Watermark::LastFullSweep, first).await.unwrap();
    watermark::set(&pool, Watermark::LastFullSweep, later).await.unwrap();

    assert_eq!(watermark::get(&pool, Watermark::LastFullSweep).await.unwrap(), Some(later));
    assert!(watermark::get(&pool, Watermark::LastChangesSync).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_malformed_watermark_treated_as_absent(pool: PgPool) {
    sqlx::query("INSERT INTO service_metadata (key, value) VALUES ('last_changes_sync', 'yesterday')")
        .execute(&pool)
        .await
        .unwrap();

    assert!(watermark::get(&pool, Watermark::LastChangesSync).await.unwrap().is_none());
}
