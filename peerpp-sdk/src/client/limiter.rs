//! Request throttling shared by every call of an [`IntraClient`](super::IntraClient).

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;

/// Per-second request counter keyed on the current UTC second.
///
/// The first `max_per_second` acquisitions of a second pass immediately;
/// later ones wait for the start of the next second and try again.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_second: u32,
    window: Mutex<Window>,
}

#[derive(Debug, Default)]
struct Window {
    second: i64,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second: max_per_second.max(1),
            window: Mutex::new(Window::default()),
        }
    }

    /// Try to take a slot at `now`.
    ///
    /// Returns `None` when the caller may proceed, or how long to wait until
    /// the next second boundary.
    pub fn acquire_at(&self, now: OffsetDateTime) -> Option<Duration> {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let second = now.unix_timestamp();
        if window.second != second {
            window.second = second;
            window.count = 0;
        }
        if window.count < self.max_per_second {
            window.count += 1;
            None
        } else {
            Some(until_next_second(now))
        }
    }

    /// Wait until a slot is available in the current second.
    pub async fn acquire(&self) {
        while let Some(wait) = self.acquire_at(OffsetDateTime::now_utc()) {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Request throttled");
            tokio::time::sleep(wait).await;
        }
    }
}

fn until_next_second(now: OffsetDateTime) -> Duration {
    Duration::from_nanos(1_000_000_000 - u64::from(now.nanosecond()))
}

/// Exponential cooldown applied after HTTP 429 responses.
///
/// Each consecutive 429 waits for the current cooldown and doubles it; any
/// other response resets it to the base.
#[derive(Debug)]
pub struct Cooldown {
    base: Duration,
    current: Mutex<Duration>,
}

impl Cooldown {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: Mutex::new(base),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// The wait the next 429 would cause.
    pub fn current(&self) -> Duration {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the wait for this 429 and double the next one.
    pub fn escalate(&self) -> Duration {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let wait = *current;
        *current = current.saturating_mul(2);
        wait
    }

    pub fn reset(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = self.base;
    }
}
