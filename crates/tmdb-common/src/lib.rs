//! TMDB Sync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by the sync worker and the job producer CLI:
//!
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Environment**: typed environment lookups that reject malformed values
//! - **Errors**: configuration error type shared by both binaries

pub mod env;
pub mod error;
pub mod logging;

pub use error::{ConfigError, Result};
