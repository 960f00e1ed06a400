//! TMDB Sync worker - main entry point

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info, warn};

use tmdb_common::logging::{init_logging, LogConfig};
use tmdb_sync::catalog::CatalogClient;
use tmdb_sync::config::Config;
use tmdb_sync::db;
use tmdb_sync::fetch::{FetchEngine, FetchSettings};
use tmdb_sync::jobs::JobStore;
use tmdb_sync::notify::Notifier;
use tmdb_sync::scheduler::{cron, Consumer, Dispatcher};
use tmdb_sync::tasks::{TaskContext, TaskRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("tmdb-sync")
        .filter_directives("tmdb_sync=debug,sqlx=warn,reqwest=info")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _log_guard = init_logging(&log_config)?;

    info!("Starting TMDB Sync worker");

    let config = Config::load()?;
    info!(
        item_workers = config.worker.item_workers,
        queue_capacity = config.worker.item_queue_capacity,
        rate_limit = config.fetch.rate_limit,
        max_connections = config.fetch.max_connections,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    if config.enable_unaccent {
        db::ensure_unaccent(&pool).await?;
    }

    let client = CatalogClient::new(&config.catalog)?;
    let engine = Arc::new(FetchEngine::new(client, FetchSettings::from_config(&config.fetch)));
    let notifier = Notifier::new(config.webhook.clone());

    let ctx = TaskContext::new(pool.clone(), engine, notifier, &config);
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(TaskRunner::new(ctx)), &config.worker));

    let mut scheduler = JobScheduler::new().await.context("Failed to create cron scheduler")?;
    let registered = cron::start(
        &mut scheduler,
        &cron::schedules(&config.schedule),
        Arc::clone(&dispatcher),
    )
    .await?;
    info!(registered, "Cron scheduler started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = Consumer::new(
        JobStore::new(pool.clone()),
        Arc::clone(&dispatcher),
        Duration::from_secs(config.worker.listen_timeout_secs),
    );
    let mut consumer_handle = tokio::spawn(consumer.run(shutdown_rx));

    tokio::select! {
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            match consumer_handle.await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => error!(error = %format!("{e:#}"), "Consumer loop failed"),
                Err(e) => error!(error = %e, "Consumer task panicked"),
            }
        },
        result = &mut consumer_handle => {
            match result {
                Ok(Ok(())) => warn!("Consumer loop exited unexpectedly"),
                Ok(Err(e)) => error!(error = %format!("{e:#}"), "Consumer loop failed"),
                Err(e) => error!(error = %e, "Consumer task panicked"),
            }
        },
    }

    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Failed to stop cron scheduler");
    }
    dispatcher.shutdown();
    pool.close().await;

    info!("TMDB Sync worker stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
