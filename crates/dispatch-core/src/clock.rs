//! Monotonic time source, injectable so tests can control the passage of time
//! without real sleeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of monotonic time.
///
/// The dispatch engine never calls `Instant::now()` directly outside of this
/// trait's default implementation, so every timing-sensitive component
/// (queue TTLs, breaker timeouts, token bucket refill, retry backoff) can be
/// driven deterministically in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant according to this clock.
    fn now(&self) -> Instant;
}

/// The real wall clock, backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock whose value only advances when told to, for deterministic tests.
///
/// Internally stores an offset (in nanoseconds) from a fixed base `Instant`
/// captured at construction time, so `now()` remains a real `Instant` that
/// can be compared and subtracted like any other.
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a new manual clock starting at the current real time.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        })
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}
