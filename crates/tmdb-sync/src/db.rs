//! Connection pool, migrations and extensions

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .context("Failed to connect to database")?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );
    Ok(pool)
}

/// Apply the embedded migrations. Already-applied migrations are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations applied");
    Ok(())
}

/// Re-run every schema script regardless of the migration history.
///
/// The scripts only use `IF NOT EXISTS` and `OR REPLACE` forms, so this
/// recreates dropped tables, indexes and triggers and leaves the rest alone.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for migration in MIGRATOR.iter() {
        sqlx::raw_sql(migration.sql.as_ref())
            .execute(pool)
            .await
            .with_context(|| format!("Failed to apply schema script {}", migration.description))?;
    }
    info!(scripts = MIGRATOR.iter().count(), "Schema ensured");
    Ok(())
}

pub async fn ensure_unaccent(pool: &PgPool) -> Result<()> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS unaccent")
        .execute(pool)
        .await
        .context("Failed to create unaccent extension")?;
    info!("unaccent extension available");
    Ok(())
}
