//! Postgres-backed job store

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::debug;

use super::{Job, JobKind, Result};

/// Channel the insert trigger notifies with the new row id.
pub const NEW_JOB_CHANNEL: &str = "new_job";

#[derive(Debug, Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a job after validating its payload. Returns the row id.
    pub async fn enqueue(&self, kind: JobKind, payload: Option<&str>) -> Result<i32> {
        kind.validate_payload(payload)?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO job_queue (job_type, payload) VALUES ($1, $2) RETURNING id",
        )
        .bind(kind.as_str())
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        debug!(job_id = id, kind = %kind, "Enqueued job");
        Ok(id)
    }

    /// Claim the job with `id`, deleting it. `None` if it was already claimed.
    pub async fn claim(&self, id: i32) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "DELETE FROM job_queue WHERE id = $1 \
             RETURNING id, job_type, payload, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// Claim the oldest pending job, skipping rows locked by another claimer.
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "DELETE FROM job_queue WHERE id = ( \
                 SELECT id FROM job_queue \
                 ORDER BY created_at ASC, id ASC \
                 FOR UPDATE SKIP LOCKED LIMIT 1 \
             ) \
             RETURNING id, job_type, payload, created_at",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    pub async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// A dedicated connection listening on [`NEW_JOB_CHANNEL`].
    pub async fn listener(&self) -> Result<PgListener> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(NEW_JOB_CHANNEL).await?;
        Ok(listener)
    }
}
