//! Per-await polling budget

use std::time::Duration;

use tokio::time::Instant;

use wsc_core::config::PollConfig;
use wsc_core::time::remaining;

use crate::backoff::ExponentialBackoff;

/// Deadline used when the timeout does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Attempts, deadline and pacing of one `await_completion` call
pub(super) struct PollBudget {
    attempts: u32,
    started: Instant,
    deadline: Instant,
    last_poll_at: Option<Instant>,
    backoff: ExponentialBackoff,
}

impl PollBudget {
    pub(super) fn new(timeout: Duration, config: &PollConfig) -> Self {
        let started = Instant::now();
        Self {
            attempts: 0,
            started,
            deadline: started
                .checked_add(timeout)
                .unwrap_or_else(|| started + FAR_FUTURE),
            last_poll_at: None,
            backoff: ExponentialBackoff::for_polling(config),
        }
    }

    /// Delay before the next poll, clipped to the deadline.
    ///
    /// `None` once the deadline has passed.
    pub(super) fn next_wait(&mut self) -> Option<Duration> {
        let left = remaining(self.deadline);
        if left.is_zero() {
            return None;
        }
        Some(self.backoff.next_delay().min(left))
    }

    pub(super) fn expired(&self) -> bool {
        remaining(self.deadline).is_zero()
    }

    pub(super) fn remaining(&self) -> Duration {
        remaining(self.deadline)
    }

    pub(super) fn record_poll(&mut self) {
        self.attempts += 1;
        self.last_poll_at = Some(Instant::now());
    }

    pub(super) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(super) fn waited(&self) -> Duration {
        self.started.elapsed()
    }

    pub(super) fn since_last_poll(&self) -> Option<Duration> {
        self.last_poll_at.map(|at| at.elapsed())
    }
}
