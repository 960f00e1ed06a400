//! Concurrency orchestrator
//!
//! - [`consumer`]: claims jobs from the queue as notifications arrive
//! - [`admission`]: the global slot and the per-item counters
//! - [`dispatcher`]: runs admitted jobs on the global slot or the item pool
//! - [`cron`]: recurring schedules feeding the same admission path

pub mod admission;
pub mod consumer;
pub mod cron;
pub mod dispatcher;

pub use admission::{Admission, AdmissionControl, RejectReason, SchedulerState};
pub use consumer::Consumer;
pub use dispatcher::{Dispatcher, JobHandler, JobRequest};
