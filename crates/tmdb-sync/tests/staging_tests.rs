//! Full-sweep staging integration tests (requires `DATABASE_URL`)
//!
//! Row-sets are written locally and pushed through the load, safety check
//! and promotion steps without any network access.

mod common;

use sqlx::PgPool;
use std::path::Path;
use tempfile::TempDir;

use common::{count, engine_for, movie, series};
use tmdb_sync::config::StagingConfig;
use tmdb_sync::fetch::FetchSummary;
use tmdb_sync::ingest::{local_ids, persist, MediaGraph};
use tmdb_sync::staging::{RowSetFile, RowSetWriter, StagingPipeline, SweepOutcome};
use tmdb_sync::MediaKind;

fn pipeline(pool: &PgPool, dir: &Path) -> StagingPipeline {
    let config = StagingConfig {
        safety_threshold: 0.5,
        id_chunk_size: 100,
        working_dir: dir.join("sweep"),
    };
    StagingPipeline::new(pool.clone(), engine_for("http://127.0.0.1:9"), config)
}

fn write_row_sets(dir: &Path, graphs: &[MediaGraph]) -> Vec<RowSetFile> {
    let mut writer = RowSetWriter::new(dir);
    for graph in graphs {
        writer.write_graph(graph).unwrap();
    }
    writer.finish().unwrap()
}

async fn staging_table_exists(pool: &PgPool) -> bool {
    sqlx::query_scalar("SELECT to_regclass('staging_movie') IS NOT NULL")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_promotion_replaces_production(pool: PgPool) {
    persist(&pool, &movie(1)).await.unwrap();

    let dir = TempDir::new().unwrap();
    let files = write_row_sets(dir.path(), &[movie(10), movie(11), series(20)]);

    let outcome = pipeline(&pool, dir.path())
        .load_and_promote(&files, FetchSummary::default(), false)
        .await
        .unwrap();

    assert!(outcome.is_promoted());
    let mut ids: Vec<_> = local_ids(&pool, MediaKind::Movie).await.unwrap().into_iter().collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![10, 11]);
    assert_eq!(count(&pool, "series").await, 1);
    assert_eq!(count(&pool, "movie_genres").await, 2);
    assert!(!staging_table_exists(&pool).await);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_collapsed_staging_aborts(pool: PgPool) {
    for id in 1..=10 {
        persist(&pool, &movie(id)).await.unwrap();
    }

    let dir = TempDir::new().unwrap();
    let files = write_row_sets(dir.path(), &[movie(1), movie(2)]);

    let outcome = pipeline(&pool, dir.path())
        .load_and_promote(&files, FetchSummary::default(), false)
        .await
        .unwrap();

    match outcome {
        SweepOutcome::Aborted { table, production, staging } => {
            assert_eq!(table, "movie");
            assert_eq!(production, 10);
            assert_eq!(staging, 2);
        },
        SweepOutcome::Promoted { .. } => panic!("expected abort"),
    }
    assert_eq!(count(&pool, "movie").await, 10);
    assert!(!staging_table_exists(&pool).await);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_force_skips_safety_check(pool: PgPool) {
    for id in 1..=10 {
        persist(&pool, &movie(id)).await.unwrap();
    }

    let dir = TempDir::new().unwrap();
    let files = write_row_sets(dir.path(), &[movie(3)]);

    let outcome = pipeline(&pool, dir.path())
        .load_and_promote(&files, FetchSummary::default(), true)
        .await
        .unwrap();

    assert!(outcome.is_promoted());
    assert_eq!(count(&pool, "movie").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_repeated_items_loaded_once(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let files = write_row_sets(dir.path(), &[movie(7), movie(7), movie(8)]);

    let outcome = pipeline(&pool, dir.path())
        .load_and_promote(&files, FetchSummary::default(), false)
        .await
        .unwrap();

    assert!(outcome.is_promoted());
    assert_eq!(count(&pool, "movie").await, 2);
    assert_eq!(count(&pool, "movie_genres_assoc").await, 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_upserts_work_after_repeated_promotion(pool: PgPool) {
    persist(&pool, &movie(1)).await.unwrap();

    for ids in [vec![1, 2], vec![1, 2, 3]] {
        let dir = TempDir::new().unwrap();
        let graphs: Vec<_> = ids.iter().map(|id| movie(*id)).collect();
        let files = write_row_sets(dir.path(), &graphs);
        let outcome = pipeline(&pool, dir.path())
            .load_and_promote(&files, FetchSummary::default(), false)
            .await
            .unwrap();
        assert!(outcome.is_promoted());
    }

    // Keys and identity columns must survive both table swaps
    persist(&pool, &movie(1)).await.unwrap();
    persist(&pool, &movie(4)).await.unwrap();

    assert_eq!(count(&pool, "movie").await, 4);
    assert_eq!(count(&pool, "movie_alternative_titles").await, 8);
    assert_eq!(count(&pool, "movie_release_dates").await, 4);
    assert_eq!(count(&pool, "movie_videos").await, 4);
    assert_eq!(count(&pool, "movie_companies_assoc").await, 4);
    assert_eq!(count(&pool, "movie_production_companies").await, 1);
    assert_eq!(count(&pool, "movie_collections").await, 1);
    assert_eq!(count(&pool, "movie_external_ids").await, 4);
}
