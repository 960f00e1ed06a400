//! TMDB Sync Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Keeps a local PostgreSQL copy of the TMDB catalog in sync.
//!
//! # Overview
//!
//! - **Job queue**: durable `job_queue` table, woken by `LISTEN new_job`
//! - **Scheduler**: one global slot for catalog-wide jobs, a bounded worker
//!   pool for single-item jobs, cron schedules feeding both
//! - **Fetch engine**: paced, bounded-concurrency detail fetches with retry
//!   and 404 tombstones
//! - **Ingestion**: pure payload-to-rows mapping plus a transactional upsert
//! - **Staging**: CSV row-sets, `COPY` into `staging_*` tables, a row-count
//!   safety check and an atomic rename promotion
//!
//! # Architecture
//!
//! ```text
//!  cron ──┐
//!         ├──▶ admission ──▶ global slot ──▶ full sweep ──▶ staging pipeline
//!  queue ─┘        │                    └─▶ missing ids / prune / changes ─┐
//!                  └──▶ item pool ──▶ add movie / add series ───────────────┤
//!                                                                           ▼
//!                                              fetch engine ──▶ ingestion ──▶ Postgres
//! ```

pub mod catalog;
pub mod config;
pub mod db;
pub mod fetch;
pub mod ingest;
pub mod jobs;
pub mod media;
pub mod notify;
pub mod scheduler;
pub mod staging;
pub mod tasks;
pub mod watermark;

pub use config::Config;
pub use media::MediaKind;
