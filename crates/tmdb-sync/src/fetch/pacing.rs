//! Leaky-bucket pacing
//!
//! The i-th completed request of a run, counting from 1, may not be
//! processed before `i / rate` seconds have passed since the run started.
//! Holding back the consumer also holds back new requests, since the request
//! stream is only polled when a completion is consumed.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    start: Instant,
    rate: f64,
}

impl Pacer {
    /// `rate` is in requests per second; non-positive rates disable pacing.
    pub fn new(rate: f64) -> Self {
        Self::starting_at(Instant::now(), rate)
    }

    pub fn starting_at(start: Instant, rate: f64) -> Self {
        Self { start, rate }
    }

    /// How long completion `index` must still wait at `now`.
    pub fn delay_for(&self, index: usize, now: Instant) -> Duration {
        if self.rate <= 0.0 || !self.rate.is_finite() {
            return Duration::ZERO;
        }
        let due = self.start + Duration::from_secs_f64(index as f64 / self.rate);
        due.saturating_duration_since(now)
    }

    pub async fn wait(&self, index: usize) {
        let delay = self.delay_for(index, Instant::now());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
