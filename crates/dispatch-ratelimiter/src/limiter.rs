use std::sync::Mutex;
use std::time::{Duration, Instant};

use dispatch_core::Clock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Result of attempting to acquire tokens.
/// `Ok(wait_duration)` means the tokens were granted, possibly after waiting.
/// `Err(())` means the caller's cancellation token fired before tokens were available.
type AcquireResult = Result<Duration, ()>;

/// Continuous-refill token bucket state.
///
/// `tokens = min(capacity, tokens + elapsed * refill_rate)` on every access;
/// there is no fixed window to roll over, so refill is exact regardless of
/// how long the bucket goes unobserved.
struct TokenBucketState {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucketState {
    fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempts to take `n` tokens. On success, decrements atomically and
    /// returns `Ok(Duration::ZERO)`. On failure, returns the wait until `n`
    /// tokens would be available.
    fn try_acquire(&mut self, n: f64, now: Instant) -> Result<(), Duration> {
        self.refill(now);

        if self.tokens >= n {
            self.tokens -= n;
            return Ok(());
        }

        let shortfall = n - self.tokens;
        let wait_secs = shortfall / self.refill_rate;
        Err(Duration::from_secs_f64(wait_secs.max(0.0)))
    }
}

/// A token bucket shared across every dispatcher worker.
///
/// A single mutex guards `(tokens, last_refill)`; waiters retry in a
/// sleep-then-recheck loop rather than being handed a ticket, so tokens
/// freed up by a canceled waiter are immediately available to whoever polls
/// next — there's no queue of reserved-but-unclaimed permits.
#[derive(Clone)]
pub(crate) struct SharedTokenBucket {
    state: std::sync::Arc<Mutex<TokenBucketState>>,
    clock: std::sync::Arc<dyn Clock>,
}

impl SharedTokenBucket {
    pub(crate) fn new(capacity: f64, refill_rate: f64, clock: std::sync::Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            state: std::sync::Arc::new(Mutex::new(TokenBucketState::new(
                capacity,
                refill_rate,
                now,
            ))),
            clock,
        }
    }

    /// Acquires `n` tokens, suspending the caller until they're available.
    ///
    /// Returns `Err(())` without consuming tokens if `cancel` fires first.
    pub(crate) async fn acquire(&self, n: u32, cancel: &CancellationToken) -> AcquireResult {
        let n = n as f64;
        let mut total_wait = Duration::ZERO;

        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                state.try_acquire(n, self.clock.now())
            };

            match wait {
                Ok(()) => return Ok(total_wait),
                Err(duration) => {
                    tokio::select! {
                        _ = sleep(duration) => {
                            total_wait += duration;
                        }
                        _ = cancel.cancelled() => {
                            return Err(());
                        }
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        state.refill(self.clock.now());
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::ManualClock;

    #[test]
    fn grants_up_to_capacity_immediately() {
        let clock = ManualClock::new();
        let mut state = TokenBucketState::new(10.0, 5.0, clock.now());
        assert!(state.try_acquire(10.0, clock.now()).is_ok());
        assert!(state.try_acquire(1.0, clock.now()).is_err());
    }

    #[test]
    fn refills_continuously() {
        let clock = ManualClock::new();
        let mut state = TokenBucketState::new(10.0, 5.0, clock.now());
        state.try_acquire(10.0, clock.now()).unwrap();

        clock.advance(Duration::from_secs(1));
        state.refill(clock.now());
        assert!((state.tokens - 5.0).abs() < 1e-9);

        clock.advance(Duration::from_secs(10));
        state.refill(clock.now());
        assert!((state.tokens - 10.0).abs() < 1e-9, "capped at capacity");
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_refill() {
        let system_clock: std::sync::Arc<dyn Clock> = std::sync::Arc::new(dispatch_core::SystemClock);
        let bucket = SharedTokenBucket::new(1.0, 1.0, system_clock);
        let cancel = CancellationToken::new();

        assert!(bucket.acquire(1, &cancel).await.is_ok());
        let result = bucket.acquire(1, &cancel).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn acquire_honors_cancellation() {
        let system_clock: std::sync::Arc<dyn Clock> = std::sync::Arc::new(dispatch_core::SystemClock);
        let bucket = SharedTokenBucket::new(0.0, 0.001, system_clock);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = bucket.acquire(1, &cancel).await;
        assert!(result.is_err());
        assert_eq!(bucket.available_tokens(), 0.0);
    }
}
