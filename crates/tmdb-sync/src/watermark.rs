//! Sync watermarks in `service_metadata`

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    LastFullSweep,
    LastChangesSync,
}

impl Watermark {
    pub fn key(self) -> &'static str {
        match self {
            Watermark::LastFullSweep => "last_full_sweep",
            Watermark::LastChangesSync => "last_changes_sync",
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Stored value of `mark`. An unparseable value is logged and treated as absent.
pub async fn get(pool: &PgPool, mark: Watermark) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM service_metadata WHERE key = $1")
        .bind(mark.key())
        .fetch_optional(pool)
        .await?;

    Ok(value.and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(e) => {
            warn!(key = mark.key(), value = %raw, error = %e, "Ignoring malformed watermark");
            None
        },
    }))
}

/// Upsert `mark` as an RFC 3339 UTC timestamp.
pub async fn set(pool: &PgPool, mark: Watermark, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO service_metadata (key, value, updated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(mark.key())
    .bind(at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}
