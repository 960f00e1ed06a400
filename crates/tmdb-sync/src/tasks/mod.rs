//! Job bodies
//!
//! [`TaskRunner`] maps each [`JobKind`] to its task and reports failures to
//! the operator webhook.

pub mod add_item;
pub mod changes_sync;
pub mod full_sweep;
pub mod missing_ids;
pub mod prune;

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{Config, StagingConfig, SyncPolicy};
use crate::db;
use crate::fetch::FetchEngine;
use crate::jobs::{is_forced, parse_item_id, JobKind};
use crate::notify::Notifier;
use crate::scheduler::{JobHandler, JobRequest};

/// Everything a task needs, shared by all jobs.
#[derive(Clone)]
pub struct TaskContext {
    pub pool: PgPool,
    pub engine: Arc<FetchEngine>,
    pub notifier: Notifier,
    pub sync: SyncPolicy,
    pub staging: StagingConfig,
    pub enable_unaccent: bool,
}

impl TaskContext {
    pub fn new(pool: PgPool, engine: Arc<FetchEngine>, notifier: Notifier, config: &Config) -> Self {
        Self {
            pool,
            engine,
            notifier,
            sync: config.sync.clone(),
            staging: config.staging.clone(),
            enable_unaccent: config.enable_unaccent,
        }
    }

    /// Send an operator message of the form `**TMDB Service:** {text}`.
    pub async fn announce(&self, text: &str) {
        self.notifier.notify(&format!("**TMDB Service:** {text}")).await;
    }
}

/// Error message sent when a job fails.
pub fn failure_message(kind: JobKind, error: &anyhow::Error) -> String {
    format!("**TMDB Service Error in {kind}:**\n```{error:#}```")
}

pub struct TaskRunner {
    ctx: TaskContext,
}

impl TaskRunner {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler for TaskRunner {
    async fn run(&self, request: JobRequest) -> anyhow::Result<()> {
        let ctx = &self.ctx;
        match request.kind {
            JobKind::FullSweep => full_sweep::run(ctx, is_forced(request.payload())).await.map(drop),
            JobKind::MissingIds => missing_ids::run(ctx).await.map(drop),
            JobKind::PruneDeleted => prune::run(ctx).await.map(drop),
            JobKind::ChangesSync => changes_sync::run(ctx).await.map(drop),
            JobKind::CreateTables => db::ensure_schema(&ctx.pool).await,
            JobKind::AddMovie | JobKind::AddSeries => {
                let id = parse_item_id(request.kind, request.payload())?;
                match request.kind.item_kind() {
                    Some(kind) => add_item::run(ctx, kind, id).await.map(drop),
                    None => Ok(()),
                }
            },
        }
    }

    async fn on_failure(&self, request: &JobRequest, error: &anyhow::Error) {
        self.ctx.notifier.notify(&failure_message(request.kind, error)).await;
    }
}
