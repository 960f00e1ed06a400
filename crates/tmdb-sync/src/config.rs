//! Configuration management
//!
//! Everything is read from the environment (after loading `.env`). Unset
//! variables fall back to the `DEFAULT_*` constants below; malformed values
//! abort startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tmdb_common::env;

// ============================================================================
// Database
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/tmdb";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Catalog API
// ============================================================================

pub const DEFAULT_API_BASE_URL: &str = "https://api.themoviedb.org/3";

pub const DEFAULT_EXPORTS_BASE_URL: &str = "http://files.tmdb.org/p/exports";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Fetch engine
// ============================================================================

/// Requests per second per connection.
pub const DEFAULT_RATE_LIMIT: f64 = 40.0;

/// Maximum concurrent in-flight requests.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Bodies handed to the sink at once.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Attempts per request before it is counted as failed.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Fixed delay between attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

// ============================================================================
// Changes sync policy
// ============================================================================

/// A changes sync within this many hours of a full sweep is skipped.
pub const DEFAULT_FULL_SWEEP_GRACE_HOURS: i64 = 24;

/// The changes feed only reaches this far back.
pub const DEFAULT_MAX_LOOKBACK_DAYS: i64 = 14;

/// Windows wider than this are split into chunks.
pub const DEFAULT_CHUNKING_THRESHOLD_DAYS: i64 = 3;

/// Width of each chunk in days.
pub const DEFAULT_CHUNK_DAYS: i64 = 1;

/// The changes feed refuses pages past this one.
pub const DEFAULT_MAX_PAGES: u32 = 500;

// ============================================================================
// Staging
// ============================================================================

/// Maximum tolerated relative drop in root row count.
pub const DEFAULT_SAFETY_THRESHOLD: f64 = 0.5;

/// IDs per fetch run during a full sweep.
pub const DEFAULT_ID_CHUNK_SIZE: usize = 500;

// ============================================================================
// Worker
// ============================================================================

/// Workers serving per-item jobs.
pub const DEFAULT_ITEM_WORKERS: usize = 2;

/// Pending per-item jobs before submissions are rejected.
pub const DEFAULT_ITEM_QUEUE_CAPACITY: usize = 75;

/// Seconds to wait for a notification before polling the queue.
pub const DEFAULT_LISTEN_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Webhook
// ============================================================================

pub const DEFAULT_WEBHOOK_MAX_ATTEMPTS: u32 = 6;

pub const DEFAULT_WEBHOOK_RETRY_DELAY_SECS: u64 = 1;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub fetch: FetchConfig,
    pub sync: SyncPolicy,
    pub staging: StagingConfig,
    pub worker: WorkerConfig,
    pub schedule: ScheduleConfig,
    pub webhook: WebhookConfig,
    pub enable_unaccent: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Catalog API endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(skip_serializing)]
    pub read_access_token: String,
    pub api_base_url: String,
    pub exports_base_url: String,
    pub request_timeout_secs: u64,
}

/// Fetch engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub rate_limit: f64,
    pub max_connections: usize,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

/// Changes sync thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPolicy {
    pub full_sweep_grace_hours: i64,
    pub max_lookback_days: i64,
    pub chunking_threshold_days: i64,
    pub chunk_days: i64,
    pub max_pages: u32,
}

/// Full sweep staging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    pub safety_threshold: f64,
    pub id_chunk_size: usize,
    pub working_dir: PathBuf,
}

/// Job consumer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub item_workers: usize,
    pub item_queue_capacity: usize,
    pub listen_timeout_secs: u64,
}

/// Raw cron expressions; validated when the scheduler starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub full_sweep: Option<String>,
    pub missing_ids: Option<String>,
    pub prune: Option<String>,
    pub changes_sync: Option<String>,
}

/// Outbound notification webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            full_sweep_grace_hours: DEFAULT_FULL_SWEEP_GRACE_HOURS,
            max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
            chunking_threshold_days: DEFAULT_CHUNKING_THRESHOLD_DAYS,
            chunk_days: DEFAULT_CHUNK_DAYS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            safety_threshold: DEFAULT_SAFETY_THRESHOLD,
            id_chunk_size: DEFAULT_ID_CHUNK_SIZE,
            working_dir: default_working_dir(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            item_workers: DEFAULT_ITEM_WORKERS,
            item_queue_capacity: DEFAULT_ITEM_QUEUE_CAPACITY,
            listen_timeout_secs: DEFAULT_LISTEN_TIMEOUT_SECS,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            username: None,
            password: None,
            max_attempts: DEFAULT_WEBHOOK_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_WEBHOOK_RETRY_DELAY_SECS,
        }
    }
}

fn default_working_dir() -> PathBuf {
    std::env::temp_dir().join("tmdb-sync")
}

impl Config {
    /// Load `.env`, read the environment and validate the result.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Read every setting from the environment without validating.
    pub fn from_env() -> tmdb_common::Result<Self> {
        Ok(Config {
            database: DatabaseConfig {
                url: env::string_or("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env::parse_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
                min_connections: env::parse_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                )?,
                connect_timeout_secs: env::parse_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?,
                idle_timeout_secs: env::parse_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                )?,
            },
            catalog: CatalogConfig {
                read_access_token: env::required("TMDB_READ_ACCESS_TOKEN")?,
                api_base_url: env::string_or("TMDB_API_BASE_URL", DEFAULT_API_BASE_URL),
                exports_base_url: env::string_or("TMDB_EXPORTS_BASE_URL", DEFAULT_EXPORTS_BASE_URL),
                request_timeout_secs: env::parse_or(
                    "TMDB_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?,
            },
            fetch: FetchConfig {
                rate_limit: env::parse_or("TMDB_RATE_LIMIT", DEFAULT_RATE_LIMIT)?,
                max_connections: env::parse_or("TMDB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
                batch_size: env::parse_or("TMDB_BATCH_INSERT", DEFAULT_BATCH_SIZE)?,
                max_retries: env::parse_or("TMDB_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
                retry_delay_secs: env::parse_or("TMDB_RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY_SECS)?,
            },
            sync: SyncPolicy {
                full_sweep_grace_hours: env::parse_or(
                    "SYNC_FULL_SWEEP_GRACE_HOURS",
                    DEFAULT_FULL_SWEEP_GRACE_HOURS,
                )?,
                max_lookback_days: env::parse_or("SYNC_MAX_LOOKBACK_DAYS", DEFAULT_MAX_LOOKBACK_DAYS)?,
                chunking_threshold_days: env::parse_or(
                    "SYNC_CHUNKING_THRESHOLD_DAYS",
                    DEFAULT_CHUNKING_THRESHOLD_DAYS,
                )?,
                chunk_days: env::parse_or("SYNC_CHUNK_DAYS", DEFAULT_CHUNK_DAYS)?,
                max_pages: env::parse_or("SYNC_MAX_PAGES", DEFAULT_MAX_PAGES)?,
            },
            staging: StagingConfig {
                safety_threshold: env::parse_or("STAGING_SAFETY_THRESHOLD", DEFAULT_SAFETY_THRESHOLD)?,
                id_chunk_size: env::parse_or("STAGING_ID_CHUNK_SIZE", DEFAULT_ID_CHUNK_SIZE)?,
                working_dir: env::optional("TMDB_WORKING_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_working_dir),
            },
            worker: WorkerConfig {
                item_workers: env::parse_or("WORKER_ITEM_WORKERS", DEFAULT_ITEM_WORKERS)?,
                item_queue_capacity: env::parse_or(
                    "WORKER_ITEM_QUEUE_CAPACITY",
                    DEFAULT_ITEM_QUEUE_CAPACITY,
                )?,
                listen_timeout_secs: env::parse_or(
                    "WORKER_LISTEN_TIMEOUT_SECS",
                    DEFAULT_LISTEN_TIMEOUT_SECS,
                )?,
            },
            schedule: ScheduleConfig {
                full_sweep: env::optional("CRON_FULL_SWEEP"),
                missing_ids: env::optional("CRON_MISSING_ONLY"),
                prune: env::optional("CRON_PRUNE"),
                changes_sync: env::optional("CRON_CHANGES_SYNC"),
            },
            webhook: WebhookConfig {
                enabled: env::flag("WEBHOOK_ENABLED"),
                url: env::optional("WEBHOOK_URL"),
                username: env::optional("WEBHOOK_BOT_USR"),
                password: env::optional("WEBHOOK_BOT_PW"),
                max_attempts: env::parse_or("WEBHOOK_MAX_ATTEMPTS", DEFAULT_WEBHOOK_MAX_ATTEMPTS)?,
                retry_delay_secs: DEFAULT_WEBHOOK_RETRY_DELAY_SECS,
            },
            enable_unaccent: env::flag("ENABLE_UNACCENT"),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.catalog.read_access_token.trim().is_empty() {
            anyhow::bail!("TMDB_READ_ACCESS_TOKEN cannot be empty");
        }

        if self.fetch.rate_limit <= 0.0 || !self.fetch.rate_limit.is_finite() {
            anyhow::bail!("Rate limit must be a positive number, got {}", self.fetch.rate_limit);
        }

        if self.fetch.max_connections == 0 || self.fetch.batch_size == 0 {
            anyhow::bail!("Fetch max_connections and batch_size must be greater than 0");
        }

        if self.worker.item_workers == 0 {
            anyhow::bail!("At least one item worker is required");
        }

        if self.worker.item_queue_capacity == 0 {
            anyhow::bail!("Item queue capacity must be greater than 0");
        }

        let threshold = self.staging.safety_threshold;
        if threshold.is_nan() || threshold <= 0.0 || threshold > 1.0 {
            anyhow::bail!("Staging safety threshold must be in (0, 1], got {}", threshold);
        }

        if self.staging.id_chunk_size == 0 {
            anyhow::bail!("Staging ID chunk size must be greater than 0");
        }

        if self.sync.chunk_days <= 0 {
            anyhow::bail!("Changes sync chunk width must be at least one day");
        }

        if self.sync.max_lookback_days <= 0 || self.sync.max_pages == 0 {
            anyhow::bail!("Changes sync lookback and page ceiling must be positive");
        }

        if self.webhook.enabled && self.webhook.url.is_none() {
            tracing::warn!("Webhook enabled without WEBHOOK_URL - notifications will be dropped");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            catalog: CatalogConfig {
                read_access_token: String::new(),
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                exports_base_url: DEFAULT_EXPORTS_BASE_URL.to_string(),
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            fetch: FetchConfig::default(),
            sync: SyncPolicy::default(),
            staging: StagingConfig::default(),
            worker: WorkerConfig::default(),
            schedule: ScheduleConfig::default(),
            webhook: WebhookConfig::default(),
            enable_unaccent: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid() -> Config {
        let mut config = Config::default();
        config.catalog.read_access_token = "token".to_string();
        config
    }

    #[test]
    fn test_defaults_validate_with_token() {
        assert!(valid().validate().is_ok());
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let mut config = valid();
        config.staging.safety_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.staging.safety_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.sync.chunk_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_workers_and_rate() {
        let mut config = valid();
        config.worker.item_workers = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.fetch.rate_limit = 0.0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.worker.item_queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        std::env::set_var("TMDB_READ_ACCESS_TOKEN", "abc");
        std::env::set_var("TMDB_RATE_LIMIT", "20");
        std::env::set_var("CRON_PRUNE", "0 4 * * *");
        std::env::remove_var("WORKER_ITEM_QUEUE_CAPACITY");

        let config = Config::from_env().unwrap();
        assert_eq!(config.fetch.rate_limit, 20.0);
        assert_eq!(config.schedule.prune.as_deref(), Some("0 4 * * *"));
        assert_eq!(config.worker.item_queue_capacity, DEFAULT_ITEM_QUEUE_CAPACITY);

        std::env::remove_var("TMDB_RATE_LIMIT");
        std::env::remove_var("CRON_PRUNE");
        std::env::remove_var("TMDB_READ_ACCESS_TOKEN");
    }

    #[test]
    #[serial]
    fn test_from_env_missing_token_fails() {
        std::env::remove_var("TMDB_READ_ACCESS_TOKEN");
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_malformed_number_fails() {
        std::env::set_var("TMDB_READ_ACCESS_TOKEN", "abc");
        std::env::set_var("SYNC_MAX_PAGES", "lots");
        assert!(Config::from_env().is_err());
        std::env::remove_var("SYNC_MAX_PAGES");
        std::env::remove_var("TMDB_READ_ACCESS_TOKEN");
    }
}
