//! Job dispatch onto the global slot or the per-item worker pool

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::admission::{Admission, AdmissionControl, ItemTicket, RejectReason, SchedulerState};
use crate::config::WorkerConfig;
use crate::jobs::{Job, JobKind, JobStoreError};

/// A job ready to run, whether claimed from the queue or fired by cron.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub payload: Option<String>,
    /// Queue row id; `None` for scheduled jobs.
    pub job_id: Option<i32>,
}

impl JobRequest {
    pub fn new(kind: JobKind, payload: Option<String>) -> Self {
        Self {
            kind,
            payload,
            job_id: None,
        }
    }

    /// A cron-fired job. Scheduled full sweeps are never forced.
    pub fn scheduled(kind: JobKind) -> Self {
        Self::new(kind, None)
    }

    pub fn from_job(job: Job) -> Result<Self, JobStoreError> {
        let kind = job.kind()?;
        Ok(Self {
            kind,
            payload: job.payload,
            job_id: Some(job.id),
        })
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}

/// Executes job bodies.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(&self, request: JobRequest) -> anyhow::Result<()>;

    /// Called after `run` failed or panicked.
    async fn on_failure(&self, _request: &JobRequest, _error: &anyhow::Error) {}
}

type ItemQueue = mpsc::Receiver<ItemTicket<JobRequest>>;

/// Routes requests through admission control and runs them on spawned tasks.
pub struct Dispatcher {
    admission: Arc<AdmissionControl>,
    handler: Arc<dyn JobHandler>,
    item_tx: mpsc::Sender<ItemTicket<JobRequest>>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start `item_workers` workers behind a queue of `item_queue_capacity`.
    pub fn new(handler: Arc<dyn JobHandler>, config: &WorkerConfig) -> Self {
        let (item_tx, item_rx) = mpsc::channel(config.item_queue_capacity.max(1));
        let item_rx = Arc::new(Mutex::new(item_rx));

        let workers = (0..config.item_workers.max(1))
            .map(|worker| tokio::spawn(item_worker(worker, Arc::clone(&item_rx), Arc::clone(&handler))))
            .collect();

        info!(
            workers = config.item_workers,
            capacity = config.item_queue_capacity,
            "Item worker pool started"
        );

        Self {
            admission: AdmissionControl::new(),
            handler,
            item_tx,
            workers,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.admission.snapshot()
    }

    /// Admit and start a job. Never blocks; a rejection is logged and returned.
    pub fn submit(&self, request: JobRequest) -> Admission {
        let kind = request.kind;
        let job_id = request.job_id;

        let admission = match self.admit(request) {
            Ok(()) => Admission::Accepted,
            Err(reason) => Admission::Rejected(reason),
        };

        match &admission {
            Admission::Accepted => info!(job_id = ?job_id, kind = %kind, "Job admitted"),
            Admission::Rejected(reason) => {
                warn!(job_id = ?job_id, kind = %kind, reason = %reason, "Job rejected")
            },
        }
        admission
    }

    fn admit(&self, request: JobRequest) -> Result<(), RejectReason> {
        request
            .kind
            .validate_payload(request.payload())
            .map_err(|e| RejectReason::InvalidPayload(e.to_string()))?;

        if request.kind.is_global() {
            let guard = self.admission.try_start_global()?;
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let _guard = guard;
                execute(handler, request).await;
            });
            Ok(())
        } else {
            self.admission
                .try_submit_item(&self.item_tx, request)
                .map_err(|(reason, _)| reason)
        }
    }

    /// Stop the item workers. Running jobs are abandoned.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn item_worker(worker: usize, queue: Arc<Mutex<ItemQueue>>, handler: Arc<dyn JobHandler>) {
    loop {
        let ticket = queue.lock().await.recv().await;
        let Some(ticket) = ticket else {
            break;
        };
        let (request, _guard) = ticket.into_parts();
        info!(worker, job_id = ?request.job_id, kind = %request.kind, "Item worker picked up job");
        execute(Arc::clone(&handler), request).await;
    }
}

/// Run one job body on its own task so a panic is contained and reported.
async fn execute(handler: Arc<dyn JobHandler>, request: JobRequest) {
    let started = Instant::now();
    info!(job_id = ?request.job_id, kind = %request.kind, "Job started");

    let body_handler = Arc::clone(&handler);
    let body_request = request.clone();
    let result = match tokio::spawn(async move { body_handler.run(body_request).await }).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(anyhow!("job panicked")),
        Err(e) => Err(anyhow!("job task cancelled: {e}")),
    };

    let elapsed_secs = started.elapsed().as_secs();
    match result {
        Ok(()) => info!(job_id = ?request.job_id, kind = %request.kind, elapsed_secs, "Job finished"),
        Err(e) => {
            error!(
                job_id = ?request.job_id,
                kind = %request.kind,
                elapsed_secs,
                error = %format!("{e:#}"),
                "Job failed"
            );
            handler.on_failure(&request, &e).await;
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Blocks every job until released; counts failures.
    struct GateHandler {
        gate: Notify,
        started: AtomicUsize,
        failures: AtomicUsize,
    }

    impl GateHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                started: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl JobHandler for GateHandler {
        async fn run(&self, request: JobRequest) -> anyhow::Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if request.payload() == Some("fail") {
                anyhow::bail!("requested failure");
            }
            Ok(())
        }

        async fn on_failure(&self, _request: &JobRequest, _error: &anyhow::Error) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(workers: usize, capacity: usize) -> WorkerConfig {
        WorkerConfig {
            item_workers: workers,
            item_queue_capacity: capacity,
            listen_timeout_secs: 1,
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn add_movie(id: i64) -> JobRequest {
        JobRequest::new(JobKind::AddMovie, Some(id.to_string()))
    }

    #[tokio::test]
    async fn test_global_and_item_never_overlap() {
        let handler = GateHandler::new();
        let dispatcher = Dispatcher::new(handler.clone(), &config(2, 10));

        assert!(dispatcher.submit(JobRequest::scheduled(JobKind::PruneDeleted)).is_accepted());
        assert_eq!(
            dispatcher.submit(add_movie(1)),
            Admission::Rejected(RejectReason::GlobalRunning)
        );
        assert_eq!(
            dispatcher.submit(JobRequest::scheduled(JobKind::ChangesSync)),
            Admission::Rejected(RejectReason::GlobalRunning)
        );

        wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;
        handler.gate.notify_one();
        wait_until(|| dispatcher.state() == SchedulerState::default()).await;

        assert!(dispatcher.submit(add_movie(2)).is_accepted());
        assert!(matches!(
            dispatcher.submit(JobRequest::scheduled(JobKind::FullSweep)),
            Admission::Rejected(RejectReason::ItemJobsActive(1))
        ));

        wait_until(|| handler.started.load(Ordering::SeqCst) == 2).await;
        handler.gate.notify_one();
        wait_until(|| dispatcher.state() == SchedulerState::default()).await;
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_overflow_rejected_not_blocked() {
        let handler = GateHandler::new();
        let dispatcher = Dispatcher::new(handler.clone(), &config(1, 2));

        assert!(dispatcher.submit(add_movie(1)).is_accepted());
        wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;

        assert!(dispatcher.submit(add_movie(2)).is_accepted());
        assert!(dispatcher.submit(add_movie(3)).is_accepted());
        assert_eq!(
            dispatcher.submit(add_movie(4)),
            Admission::Rejected(RejectReason::QueueFull)
        );
        assert_eq!(dispatcher.state().active_item_jobs, 3);
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_item_payload_rejected() {
        let dispatcher = Dispatcher::new(GateHandler::new(), &config(1, 2));
        let admission = dispatcher.submit(JobRequest::new(JobKind::AddSeries, Some("abc".into())));
        assert!(matches!(admission, Admission::Rejected(RejectReason::InvalidPayload(_))));
        assert_eq!(dispatcher.state(), SchedulerState::default());
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_failure_reported_and_slot_released() {
        let handler = GateHandler::new();
        let dispatcher = Dispatcher::new(handler.clone(), &config(1, 2));

        let request = JobRequest::new(JobKind::MissingIds, Some("fail".into()));
        assert!(dispatcher.submit(request).is_accepted());
        wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;
        handler.gate.notify_one();

        wait_until(|| handler.failures.load(Ordering::SeqCst) == 1).await;
        wait_until(|| !dispatcher.state().global_running).await;
        dispatcher.shutdown();
    }
}
