//! Admission control for the global slot and the per-item pool
//!
//! Both counters live behind one mutex and are only reachable through
//! [`AdmissionControl`]. A check and the matching update always happen in the
//! same critical section, and each admitted job holds a guard that releases
//! its counter on drop, whatever way the job ends.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Snapshot of the scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerState {
    pub global_running: bool,
    pub active_item_jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    GlobalRunning,
    ItemJobsActive(usize),
    QueueFull,
    QueueClosed,
    InvalidPayload(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::GlobalRunning => f.write_str("a global job is already running"),
            RejectReason::ItemJobsActive(n) => write!(f, "{n} item job(s) still active"),
            RejectReason::QueueFull => f.write_str("item queue is full"),
            RejectReason::QueueClosed => f.write_str("item queue is closed"),
            RejectReason::InvalidPayload(reason) => write!(f, "invalid payload: {reason}"),
        }
    }
}

/// Result of submitting a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

#[derive(Debug, Default)]
pub struct AdmissionControl {
    state: Mutex<SchedulerState>,
}

impl AdmissionControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SchedulerState {
        *self.lock()
    }

    /// Take the global slot. Requires no global job and no active item job.
    pub fn try_start_global(self: &Arc<Self>) -> Result<GlobalGuard, RejectReason> {
        let mut state = self.lock();
        if state.global_running {
            return Err(RejectReason::GlobalRunning);
        }
        if state.active_item_jobs > 0 {
            return Err(RejectReason::ItemJobsActive(state.active_item_jobs));
        }
        state.global_running = true;
        Ok(GlobalGuard {
            control: Arc::clone(self),
        })
    }

    /// Count an item job and enqueue it without blocking.
    ///
    /// On a full or closed queue the counter is rolled back before the lock
    /// is released and the value is handed back.
    pub fn try_submit_item<T>(
        self: &Arc<Self>,
        queue: &mpsc::Sender<ItemTicket<T>>,
        value: T,
    ) -> Result<(), (RejectReason, T)> {
        let mut state = self.lock();
        if state.global_running {
            return Err((RejectReason::GlobalRunning, value));
        }
        state.active_item_jobs += 1;

        let ticket = ItemTicket {
            value,
            guard: ItemGuard {
                control: Some(Arc::clone(self)),
            },
        };

        match queue.try_send(ticket) {
            Ok(()) => Ok(()),
            Err(e) => {
                state.active_item_jobs -= 1;
                let (reason, ticket) = match e {
                    TrySendError::Full(t) => (RejectReason::QueueFull, t),
                    TrySendError::Closed(t) => (RejectReason::QueueClosed, t),
                };
                let (value, mut guard) = ticket.into_parts();
                guard.control = None;
                Err((reason, value))
            },
        }
    }

    fn release_global(&self) {
        self.lock().global_running = false;
    }

    fn release_item(&self) {
        let mut state = self.lock();
        state.active_item_jobs = state.active_item_jobs.saturating_sub(1);
    }
}

/// Held by a running global job.
#[derive(Debug)]
pub struct GlobalGuard {
    control: Arc<AdmissionControl>,
}

impl Drop for GlobalGuard {
    fn drop(&mut self) {
        self.control.release_global();
    }
}

/// Held by a queued or running item job.
#[derive(Debug)]
pub struct ItemGuard {
    control: Option<Arc<AdmissionControl>>,
}

impl Drop for ItemGuard {
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            control.release_item();
        }
    }
}

/// An admitted item job travelling through the queue.
#[derive(Debug)]
pub struct ItemTicket<T> {
    value: T,
    guard: ItemGuard,
}

impl<T> ItemTicket<T> {
    pub fn into_parts(self) -> (T, ItemGuard) {
        (self.value, self.guard)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_global_excludes_global() {
        let control = AdmissionControl::new();
        let guard = control.try_start_global().unwrap();
        assert_eq!(control.try_start_global().unwrap_err(), RejectReason::GlobalRunning);
        drop(guard);
        assert!(control.try_start_global().is_ok());
    }

    #[test]
    fn test_item_blocked_by_global() {
        let control = AdmissionControl::new();
        let (tx, _rx) = mpsc::channel(4);
        let _guard = control.try_start_global().unwrap();

        let (reason, value) = control.try_submit_item(&tx, 7).unwrap_err();
        assert_eq!(reason, RejectReason::GlobalRunning);
        assert_eq!(value, 7);
        assert_eq!(control.snapshot().active_item_jobs, 0);
    }

    #[test]
    fn test_global_blocked_by_active_item() {
        let control = AdmissionControl::new();
        let (tx, mut rx) = mpsc::channel(4);
        control.try_submit_item(&tx, 1).unwrap();

        assert_eq!(control.try_start_global().unwrap_err(), RejectReason::ItemJobsActive(1));

        let (value, guard) = rx.try_recv().unwrap().into_parts();
        assert_eq!(value, 1);
        assert_eq!(control.snapshot().active_item_jobs, 1);
        drop(guard);
        assert_eq!(control.snapshot(), SchedulerState::default());
        assert!(control.try_start_global().is_ok());
    }

    #[test]
    fn test_full_queue_rejects_and_rolls_back() {
        let control = AdmissionControl::new();
        let (tx, _rx) = mpsc::channel(2);

        assert!(control.try_submit_item(&tx, 1).is_ok());
        assert!(control.try_submit_item(&tx, 2).is_ok());
        let (reason, value) = control.try_submit_item(&tx, 3).unwrap_err();

        assert_eq!(reason, RejectReason::QueueFull);
        assert_eq!(value, 3);
        assert_eq!(control.snapshot().active_item_jobs, 2);
    }

    #[test]
    fn test_closed_queue_rejects() {
        let control = AdmissionControl::new();
        let (tx, rx) = mpsc::channel::<ItemTicket<u8>>(2);
        drop(rx);

        let (reason, _) = control.try_submit_item(&tx, 1).unwrap_err();
        assert_eq!(reason, RejectReason::QueueClosed);
        assert_eq!(control.snapshot().active_item_jobs, 0);
    }
}
