//! A global, continuously-refilling token bucket shared across dispatcher workers.
//!
//! Unlike a per-service rate limiter, this bucket has no notion of "requests
//! per period" windows — tokens trickle in continuously at `refill_rate`
//! tokens/second up to `capacity`, and `acquire` suspends the caller until
//! enough have accumulated.
//!
//! # Examples
//!
//! ```
//! use dispatch_ratelimiter::TokenBucketConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let bucket = TokenBucketConfig::builder()
//!     .refill_rate(50.0)
//!     .capacity(50.0)
//!     .build()
//!     .into_bucket();
//!
//! let cancel = CancellationToken::new();
//! bucket.acquire(1, &cancel).await.unwrap();
//! # }
//! ```

mod config;
mod error;
mod events;
mod limiter;

pub use config::{TokenBucketConfig, TokenBucketConfigBuilder};
pub use error::RateLimiterError;
pub use events::TokenBucketEvent;

use dispatch_core::Clock;
use limiter::SharedTokenBucket;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// A global rate limiter backed by a continuously-refilling token bucket.
pub struct TokenBucket {
    bucket: SharedTokenBucket,
    config: Arc<TokenBucketConfig>,
}

impl TokenBucketConfig {
    /// Builds a [`TokenBucket`] from this configuration using the real system clock.
    pub fn into_bucket(self) -> TokenBucket {
        TokenBucket::new(self, config::default_system_clock())
    }

    /// Builds a [`TokenBucket`] driven by a caller-supplied clock (for tests).
    pub fn into_bucket_with_clock(self, clock: Arc<dyn Clock>) -> TokenBucket {
        TokenBucket::new(self, clock)
    }
}

impl TokenBucket {
    fn new(config: TokenBucketConfig, clock: Arc<dyn Clock>) -> Self {
        let bucket = SharedTokenBucket::new(config.capacity, config.refill_rate, clock);
        Self {
            bucket,
            config: Arc::new(config),
        }
    }

    /// Acquires `n` tokens, suspending the caller until they're available.
    ///
    /// Returns [`RateLimiterError::Canceled`] without consuming tokens if
    /// `cancel` fires before enough tokens accumulate.
    pub async fn acquire(&self, n: u32, cancel: &CancellationToken) -> Result<Duration, RateLimiterError> {
        match self.bucket.acquire(n, cancel).await {
            Ok(waited) => {
                self.config.event_listeners.emit(&TokenBucketEvent::TokensAcquired {
                    bucket_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    tokens: n,
                    wait_duration: waited,
                });
                Ok(waited)
            }
            Err(()) => {
                self.config.event_listeners.emit(&TokenBucketEvent::AcquireCanceled {
                    bucket_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    tokens: n,
                });
                Err(RateLimiterError::Canceled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_grants_tokens_within_capacity() {
        let bucket = TokenBucketConfig::builder()
            .refill_rate(10.0)
            .capacity(10.0)
            .build()
            .into_bucket();
        let cancel = CancellationToken::new();

        for _ in 0..10 {
            assert!(bucket.acquire(1, &cancel).await.is_ok());
        }
    }

    #[tokio::test]
    async fn acquire_reports_cancellation() {
        let bucket = TokenBucketConfig::builder()
            .refill_rate(1.0)
            .capacity(0.0)
            .build()
            .into_bucket();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = bucket.acquire(1, &cancel).await;
        assert_eq!(result, Err(RateLimiterError::Canceled));
    }

    #[tokio::test]
    async fn events_fire_on_acquire_and_cancel() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let acquired = Arc::new(AtomicUsize::new(0));
        let canceled = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&acquired);
        let c = Arc::clone(&canceled);

        let bucket = TokenBucketConfig::builder()
            .refill_rate(1.0)
            .capacity(1.0)
            .on_tokens_acquired(move |_, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_acquire_canceled(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .into_bucket();

        let cancel = CancellationToken::new();
        bucket.acquire(1, &cancel).await.unwrap();
        assert_eq!(acquired.load(Ordering::SeqCst), 1);

        let canceled_token = CancellationToken::new();
        canceled_token.cancel();
        let _ = bucket.acquire(1, &canceled_token).await;
        assert_eq!(canceled.load(Ordering::SeqCst), 1);
    }
}
