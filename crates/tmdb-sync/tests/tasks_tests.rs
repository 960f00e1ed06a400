//! Job body integration tests against a mock catalog (requires `DATABASE_URL`)

mod common;

use sqlx::PgPool;
use wiremock::MockServer;

use common::{count, mount_export, movie, series, task_context};
use tmdb_sync::ingest::{local_ids, persist};
use tmdb_sync::jobs::JobKind;
use tmdb_sync::scheduler::{JobHandler, JobRequest};
use tmdb_sync::tasks::{prune, TaskRunner};
use tmdb_sync::MediaKind;

async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_tables_restores_dropped_table(pool: PgPool) {
    sqlx::query("DROP TABLE movie_videos").execute(&pool).await.unwrap();
    assert!(!table_exists(&pool, "movie_videos").await);

    let runner = TaskRunner::new(task_context(pool.clone(), "http://127.0.0.1:9"));
    runner
        .run(JobRequest::new(JobKind::CreateTables, None))
        .await
        .unwrap();

    assert!(table_exists(&pool, "movie_videos").await);

    // Existing data is left alone and a second run is harmless
    persist(&pool, &movie(550)).await.unwrap();
    runner
        .run(JobRequest::new(JobKind::CreateTables, None))
        .await
        .unwrap();
    assert_eq!(count(&pool, "movie_videos").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_prune_removes_items_missing_from_export(pool: PgPool) {
    for id in [550, 551, 777] {
        persist(&pool, &movie(id)).await.unwrap();
    }
    persist(&pool, &series(1399)).await.unwrap();

    let server = MockServer::start().await;
    mount_export(
        &server,
        MediaKind::Movie,
        "{\"id\":550,\"adult\":false}\n{\"id\":777,\"adult\":true}\n",
    )
    .await;
    mount_export(&server, MediaKind::Series, "{\"id\":1399,\"adult\":false}\n").await;

    let ctx = task_context(pool.clone(), &server.uri());
    let deleted = prune::run(&ctx).await.unwrap();

    assert_eq!(deleted, 1);
    let mut remaining: Vec<_> = local_ids(&pool, MediaKind::Movie).await.unwrap().into_iter().collect();
    remaining.sort_unstable();
    assert_eq!(remaining, vec![550, 777]);
    assert_eq!(count(&pool, "series").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_prune_refuses_empty_export(pool: PgPool) {
    persist(&pool, &movie(550)).await.unwrap();
    persist(&pool, &series(1399)).await.unwrap();

    let server = MockServer::start().await;
    mount_export(&server, MediaKind::Movie, "").await;
    mount_export(&server, MediaKind::Series, "{\"id\":42,\"adult\":false}\n").await;

    let ctx = task_context(pool.clone(), &server.uri());
    let err = prune::run(&ctx).await.unwrap_err();

    assert!(err.to_string().contains("contains no ids"), "{err:#}");
    assert_eq!(count(&pool, "movie").await, 1);
    assert_eq!(count(&pool, "series").await, 1);
}
