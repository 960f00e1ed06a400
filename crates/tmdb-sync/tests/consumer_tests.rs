//! Consumer loop integration tests (requires `DATABASE_URL`)
//!
//! A recording handler stands in for the task bodies, so these tests cover
//! claim and dispatch only.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tmdb_sync::config::WorkerConfig;
use tmdb_sync::jobs::{JobKind, JobStore};
use tmdb_sync::scheduler::{Consumer, Dispatcher, JobHandler, JobRequest};

#[derive(Default)]
struct RecordingHandler {
    seen: Mutex<Vec<i32>>,
}

impl RecordingHandler {
    fn seen(&self) -> Vec<i32> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort_unstable();
        seen
    }

    async fn wait_for(&self, expected: usize) {
        for _ in 0..200 {
            if self.seen.lock().unwrap().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("expected {expected} dispatched jobs, saw {:?}", self.seen());
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn run(&self, request: JobRequest) -> anyhow::Result<()> {
        if let Some(id) = request.job_id {
            self.seen.lock().unwrap().push(id);
        }
        Ok(())
    }
}

fn start(
    pool: &PgPool,
    handler: &Arc<RecordingHandler>,
    listen_timeout: Duration,
) -> (watch::Sender<bool>, JoinHandle<anyhow::Result<()>>) {
    let dispatcher = Arc::new(Dispatcher::new(handler.clone(), &WorkerConfig::default()));
    let consumer = Consumer::new(JobStore::new(pool.clone()), dispatcher, listen_timeout);
    let (tx, rx) = watch::channel(false);
    (tx, tokio::spawn(consumer.run(rx)))
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_notified_jobs_dispatched_once(pool: PgPool) {
    let handler = Arc::new(RecordingHandler::default());
    let (shutdown, consumer) = start(&pool, &handler, Duration::from_secs(30));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let store = JobStore::new(pool.clone());
    let first = store.enqueue(JobKind::AddMovie, Some("550")).await.unwrap();
    let second = store.enqueue(JobKind::AddSeries, Some("1399")).await.unwrap();

    handler.wait_for(2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(handler.seen(), vec![first, second]);
    assert_eq!(store.pending_count().await.unwrap(), 0);

    shutdown.send(true).unwrap();
    consumer.await.unwrap().unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_timeout_drains_unnotified_jobs(pool: PgPool) {
    sqlx::query("ALTER TABLE job_queue DISABLE TRIGGER job_insert_notify")
        .execute(&pool)
        .await
        .unwrap();

    let store = JobStore::new(pool.clone());
    let before_start = store.enqueue(JobKind::AddMovie, Some("1")).await.unwrap();

    let handler = Arc::new(RecordingHandler::default());
    let (shutdown, consumer) = start(&pool, &handler, Duration::from_millis(200));

    handler.wait_for(1).await;
    let silent = store.enqueue(JobKind::AddMovie, Some("2")).await.unwrap();
    handler.wait_for(2).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(handler.seen(), vec![before_start, silent]);
    assert_eq!(store.pending_count().await.unwrap(), 0);

    shutdown.send(true).unwrap();
    consumer.await.unwrap().unwrap();
}
