//! Row-count safety check before promotion
//!
//! A sweep whose staging root table shrank by more than the threshold
//! relative to production is treated as a broken run and never promoted.

use sqlx::PgPool;
use tracing::{info, warn};

use super::Result;
use crate::ingest::tables::TableSpec;

/// Comparison of one root table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyVerdict {
    /// No production baseline (missing or empty table).
    NoBaseline,
    Pass { production: i64, staging: i64 },
    Abort { production: i64, staging: i64, shrink: f64 },
}

impl SafetyVerdict {
    pub fn is_abort(&self) -> bool {
        matches!(self, SafetyVerdict::Abort { .. })
    }
}

/// Fraction of production rows missing from staging.
pub fn shrink_ratio(production: i64, staging: i64) -> f64 {
    if production <= 0 || staging >= production {
        return 0.0;
    }
    (production - staging) as f64 / production as f64
}

/// Abort when `(production - staging) / production` exceeds `threshold`.
pub fn evaluate(production: Option<i64>, staging: i64, threshold: f64) -> SafetyVerdict {
    match production {
        None | Some(0) => SafetyVerdict::NoBaseline,
        Some(production) => {
            let shrink = shrink_ratio(production, staging);
            if shrink > threshold {
                SafetyVerdict::Abort { production, staging, shrink }
            } else {
                SafetyVerdict::Pass { production, staging }
            }
        },
    }
}

/// Row count of `table`, or `None` when it does not exist.
pub async fn table_count(pool: &PgPool, table: &str) -> Result<Option<i64>> {
    let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Ok(None);
    }

    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(Some(count))
}

/// Compare a root table with its staging copy. Returns the first failing table.
pub async fn check_roots(
    pool: &PgPool,
    roots: &[&'static TableSpec],
    threshold: f64,
) -> Result<Option<(&'static TableSpec, SafetyVerdict)>> {
    for table in roots {
        let production = table_count(pool, table.name).await?;
        let staging = table_count(pool, &table.staging_name()).await?.unwrap_or(0);

        let verdict = evaluate(production, staging, threshold);
        match verdict {
            SafetyVerdict::NoBaseline => {
                info!(table = table.name, staging, "No production baseline, skipping safety check");
            },
            SafetyVerdict::Pass { production, staging } => {
                info!(table = table.name, production, staging, "Safety check passed");
            },
            SafetyVerdict::Abort { production, staging, shrink } => {
                warn!(table = table.name, production, staging, shrink, threshold, "Safety check failed");
                return Ok(Some((*table, verdict)));
            },
        }
    }
    Ok(None)
}
