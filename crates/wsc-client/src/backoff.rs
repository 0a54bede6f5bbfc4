//! Exponential backoff shared by request retries and task polling

use std::time::Duration;

use wsc_core::config::{BackoffConfig, PollConfig};

/// Exponential backoff with optional jitter
///
/// Each `next_delay` returns the current delay and then grows it by
/// `multiplier`, never beyond `max`. Jitter only ever lengthens a delay.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a backoff for request retries
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a deterministic backoff for polling
    pub fn for_polling(config: &PollConfig) -> Self {
        Self::new(
            config.initial_interval,
            config.max_interval,
            config.multiplier,
            0.0,
        )
    }

    /// Create a new backoff with custom parameters.
    ///
    /// A multiplier below one (or NaN) keeps the delay constant; jitter
    /// outside `0.0..=1.0` (or NaN) is clamped or disabled.
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            current: initial.min(max),
            max,
            multiplier: multiplier.max(1.0),
            jitter: if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) },
        }
    }

    /// Get the next delay and advance the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        // Growth that overflows a Duration saturates at the max delay
        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = next.min(self.max);

        if self.jitter > 0.0 {
            let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
            delay.saturating_add(Duration::try_from_secs_f64(jitter_amount).unwrap_or_default())
        } else {
            delay
        }
    }
}
