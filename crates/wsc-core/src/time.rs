//! Time utilities shared by the cache and the task dispatcher
//!
//! Wall-clock values (unix milliseconds) are used for anything that is
//! compared with controller timestamps. Deadlines use tokio's monotonic
//! `Instant` so that paused-clock tests drive them.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is set before the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Age of a unix-millisecond timestamp relative to now.
///
/// Returns `Duration::ZERO` for timestamps in the future.
pub fn age(observed_at_millis: u64) -> Duration {
    Duration::from_millis(current_time_millis().saturating_sub(observed_at_millis))
}

/// Time left until `deadline`, or zero once it has passed.
pub fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
