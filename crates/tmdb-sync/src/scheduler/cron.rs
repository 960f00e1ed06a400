//! Recurring job schedules

use anyhow::Context;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use super::dispatcher::{Dispatcher, JobRequest};
use crate::config::ScheduleConfig;
use crate::jobs::JobKind;
use tmdb_common::env::is_disabled;

/// One configured schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    pub name: &'static str,
    pub expression: Option<String>,
    pub kind: JobKind,
}

impl CronSchedule {
    /// The expression to register, or `None` when the schedule is switched off.
    pub fn active_expression(&self) -> Option<String> {
        self.expression
            .as_deref()
            .filter(|e| !is_disabled(e))
            .map(normalize_expression)
    }
}

pub fn schedules(config: &ScheduleConfig) -> Vec<CronSchedule> {
    vec![
        CronSchedule {
            name: "Full Sweep",
            expression: config.full_sweep.clone(),
            kind: JobKind::FullSweep,
        },
        CronSchedule {
            name: "Missing IDs",
            expression: config.missing_ids.clone(),
            kind: JobKind::MissingIds,
        },
        CronSchedule {
            name: "Prune",
            expression: config.prune.clone(),
            kind: JobKind::PruneDeleted,
        },
        CronSchedule {
            name: "Changes Sync",
            expression: config.changes_sync.clone(),
            kind: JobKind::ChangesSync,
        },
    ]
}

/// Five-field expressions get a leading seconds field of `0`.
pub fn normalize_expression(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

fn scheduled_job(expression: &str, kind: JobKind, dispatcher: Arc<Dispatcher>) -> anyhow::Result<Job> {
    let job = Job::new_async(expression, move |_uuid, _scheduler| {
        let dispatcher = Arc::clone(&dispatcher);
        Box::pin(async move {
            info!(kind = %kind, "Cron schedule fired");
            dispatcher.submit(JobRequest::scheduled(kind));
        })
    })
    .with_context(|| format!("Invalid cron expression {expression:?}"))?;
    Ok(job)
}

/// Register every valid schedule and start the scheduler.
///
/// Disabled schedules are logged at info and invalid ones at error; neither
/// stops the others from being registered. Returns the number registered.
pub async fn start(
    scheduler: &mut JobScheduler,
    schedules: &[CronSchedule],
    dispatcher: Arc<Dispatcher>,
) -> anyhow::Result<usize> {
    let mut registered = 0;

    for schedule in schedules {
        let Some(expression) = schedule.active_expression() else {
            info!(schedule = schedule.name, "Schedule disabled");
            continue;
        };

        match scheduled_job(&expression, schedule.kind, Arc::clone(&dispatcher)) {
            Ok(job) => {
                scheduler
                    .add(job)
                    .await
                    .with_context(|| format!("Failed to add schedule {}", schedule.name))?;
                info!(schedule = schedule.name, cron = %expression, kind = %schedule.kind, "Scheduled job");
                registered += 1;
            },
            Err(e) => {
                error!(schedule = schedule.name, cron = %expression, error = %format!("{e:#}"), "Skipping invalid schedule");
            },
        }
    }

    scheduler.start().await.context("Failed to start cron scheduler")?;
    Ok(registered)
}
