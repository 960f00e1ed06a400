//! Queue consumer loop
//!
//! Waits on the `new_job` channel with a bounded timeout. A notification
//! claims that job by id; a timeout drains any pending rows whose
//! notification was missed, such as jobs inserted while the worker was down.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::dispatcher::{Dispatcher, JobRequest};
use crate::jobs::{Job, JobStore};

pub struct Consumer {
    store: JobStore,
    dispatcher: Arc<Dispatcher>,
    listen_timeout: Duration,
}

impl Consumer {
    pub fn new(store: JobStore, dispatcher: Arc<Dispatcher>, listen_timeout: Duration) -> Self {
        Self {
            store,
            dispatcher,
            listen_timeout,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut listener = self
            .store
            .listener()
            .await
            .context("Failed to listen for new jobs")?;
        info!(timeout_secs = self.listen_timeout.as_secs(), "Listening for new jobs");

        self.drain_pending().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Consumer loop stopping");
                        break;
                    }
                },
                received = tokio::time::timeout(self.listen_timeout, listener.recv()) => match received {
                    Ok(Ok(notification)) => self.on_notification(notification.payload()).await,
                    Ok(Err(e)) => {
                        warn!(error = %e, "Job listener error, reconnecting");
                        tokio::time::sleep(self.listen_timeout).await;
                    },
                    Err(_) => self.drain_pending().await,
                },
            }
        }

        Ok(())
    }

    async fn on_notification(&self, payload: &str) {
        let Ok(id) = payload.trim().parse::<i32>() else {
            warn!(payload, "Ignoring notification with a non-numeric job id");
            return;
        };

        match self.store.claim(id).await {
            Ok(Some(job)) => self.dispatch(job),
            Ok(None) => debug!(job_id = id, "Job already claimed"),
            Err(e) => warn!(job_id = id, error = %e, "Failed to claim job"),
        }
    }

    /// Claim and dispatch every pending row.
    pub async fn drain_pending(&self) {
        loop {
            match self.store.claim_next().await {
                Ok(Some(job)) => self.dispatch(job),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to claim pending job");
                    break;
                },
            }
        }
    }

    fn dispatch(&self, job: Job) {
        let job_id = job.id;
        match JobRequest::from_job(job) {
            Ok(request) => {
                self.dispatcher.submit(request);
            },
            Err(e) => warn!(job_id, error = %e, "Ignoring unknown job"),
        }
    }
}
