//! tmdb-jobs - Main entry point

use clap::Parser;
use std::process;
use tmdb_cli::Cli;
use tmdb_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::error;

#[tokio::main]
async fn main() {
    // Load .env before parsing so DATABASE_URL defaults apply
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("tmdb-jobs")
        .build();

    // Ignore errors; the CLI works without logging
    let _guard = init_logging(&log_config);

    if let Err(e) = tmdb_cli::run(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
