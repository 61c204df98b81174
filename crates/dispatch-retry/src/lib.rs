//! The retry decision function (§4.5) — a pure mapping from an attempt's
//! outcome to `(should_retry, delay)`, with exponential backoff and jitter.
//!
//! This isn't a `tower::Layer`: the dispatcher calls [`RetryPolicy::decide`]
//! directly after classifying a transport attempt, since retried entries go
//! back through the priority queue rather than looping in place.
//!
//! # Example
//!
//! ```
//! use dispatch_retry::{AttemptOutcome, RetryConfig, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(RetryConfig::builder().max_retries(3).build());
//! let outcome = AttemptOutcome {
//!     status: Some(503),
//!     transport_error: false,
//!     timed_out: false,
//!     retry_after: None,
//! };
//! match policy.decide(1, &outcome) {
//!     RetryDecision::Retry { delay } => println!("retrying after {:?}", delay),
//!     RetryDecision::Stop => println!("giving up"),
//! }
//! ```

mod backoff;
mod config;
mod events;

pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;

use backoff::ExponentialRandomBackoff;
use dispatch_core::Clock;
use std::sync::Arc;
use std::time::Duration;

/// The outcome of a single transport attempt, as classified by the caller.
///
/// This is deliberately independent of any particular HTTP client or error
/// type — the dispatcher maps its own outcome classification onto this
/// shape before calling [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy)]
pub struct AttemptOutcome {
    /// The HTTP status code, if a response was received at all.
    pub status: Option<u16>,
    /// Whether the attempt failed below the HTTP layer (connect/read/write error).
    pub transport_error: bool,
    /// Whether the attempt was aborted for exceeding its per-attempt timeout.
    pub timed_out: bool,
    /// A `Retry-After` value from the response, if present.
    pub retry_after: Option<Duration>,
}

impl AttemptOutcome {
    /// Retryable per §4.5: transport errors, timeouts, 429, 502, 503, 504.
    fn is_retryable(&self) -> bool {
        if self.transport_error || self.timed_out {
            return true;
        }
        matches!(self.status, Some(429) | Some(502) | Some(503) | Some(504))
    }
}

/// Per-call overrides to a [`RetryPolicy`]'s configured limits (the §3 data
/// model's `RetryOverrides` field on a request descriptor, applied here
/// without constructing a second [`RetryPolicy`] per descriptor).
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOverride {
    pub max_retries: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
}

/// The result of applying a [`RetryPolicy`] to an attempt's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    Retry { delay: Duration },
    /// Do not retry; the attempt's outcome is terminal.
    Stop,
}

/// A retry policy bound to one configuration, evaluated per attempt.
pub struct RetryPolicy {
    config: Arc<RetryConfig>,
    backoff: ExponentialRandomBackoff,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let backoff = ExponentialRandomBackoff::new(
            config.base_delay,
            config.max_delay,
            config.randomization_factor,
        );
        Self {
            config: Arc::new(config),
            backoff,
        }
    }

    /// Decides whether attempt number `attempt` (1-indexed) should be
    /// retried given `outcome`, and if so, after what delay.
    ///
    /// `Retry-After` on the outcome overrides the computed backoff delay,
    /// clamped to `max_delay`.
    pub fn decide(&self, attempt: u32, outcome: &AttemptOutcome) -> RetryDecision {
        self.decide_with_override(attempt, outcome, &RetryOverride::default())
    }

    /// Same as [`RetryPolicy::decide`], but `max_retries`/`base_delay`/
    /// `max_delay` named in `override_` take precedence over this policy's
    /// own configured values — the per-descriptor `RetryOverrides` case.
    pub fn decide_with_override(&self, attempt: u32, outcome: &AttemptOutcome, override_: &RetryOverride) -> RetryDecision {
        let max_retries = override_.max_retries.unwrap_or(self.config.max_retries);
        if !outcome.is_retryable() || attempt > max_retries {
            return RetryDecision::Stop;
        }
        let max_delay = override_.max_delay.unwrap_or(self.config.max_delay);
        let delay = match outcome.retry_after {
            Some(d) => d.min(max_delay),
            None => match override_.base_delay.or(override_.max_delay) {
                Some(_) => {
                    let base_delay = override_.base_delay.unwrap_or(self.config.base_delay);
                    ExponentialRandomBackoff::new(base_delay, max_delay, self.config.randomization_factor).next_interval(attempt)
                }
                None => self.backoff.next_interval(attempt),
            },
        };
        RetryDecision::Retry { delay }
    }

    /// Same as [`RetryPolicy::decide`] but also emits the configured
    /// [`RetryEvent`]s, stamped with the given clock and origin label.
    pub fn decide_and_emit(
        &self,
        attempt: u32,
        outcome: &AttemptOutcome,
        origin_name: &str,
        clock: &Arc<dyn Clock>,
    ) -> RetryDecision {
        self.decide_and_emit_with_override(attempt, outcome, origin_name, clock, &RetryOverride::default())
    }

    /// Same as [`RetryPolicy::decide_and_emit`], applying `override_` the
    /// same way [`RetryPolicy::decide_with_override`] does.
    pub fn decide_and_emit_with_override(
        &self,
        attempt: u32,
        outcome: &AttemptOutcome,
        origin_name: &str,
        clock: &Arc<dyn Clock>,
        override_: &RetryOverride,
    ) -> RetryDecision {
        let decision = self.decide_with_override(attempt, outcome, override_);
        let now = clock.now();
        match decision {
            RetryDecision::Retry { delay } => {
                self.config.event_listeners.emit(&RetryEvent::Retry {
                    origin_name: origin_name.to_string(),
                    timestamp: now,
                    attempt,
                    delay,
                });
            }
            RetryDecision::Stop if attempt > 1 || outcome.is_retryable() => {
                self.config.event_listeners.emit(&RetryEvent::RetriesExhausted {
                    origin_name: origin_name.to_string(),
                    timestamp: now,
                    attempts: attempt,
                });
            }
            RetryDecision::Stop => {}
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::SystemClock;

    fn outcome(status: u16) -> AttemptOutcome {
        AttemptOutcome {
            status: Some(status),
            transport_error: false,
            timed_out: false,
            retry_after: None,
        }
    }

    #[test]
    fn success_never_retries() {
        let policy = RetryPolicy::new(RetryConfig::builder().build());
        assert_eq!(policy.decide(1, &outcome(200)), RetryDecision::Stop);
    }

    #[test]
    fn four_xx_other_than_429_is_terminal() {
        let policy = RetryPolicy::new(RetryConfig::builder().build());
        assert_eq!(policy.decide(1, &outcome(404)), RetryDecision::Stop);
    }

    #[test]
    fn five_xx_and_429_are_retryable() {
        let policy = RetryPolicy::new(RetryConfig::builder().build());
        for status in [429, 502, 503, 504] {
            assert!(matches!(
                policy.decide(1, &outcome(status)),
                RetryDecision::Retry { .. }
            ));
        }
    }

    #[test]
    fn stops_once_max_retries_exceeded() {
        let policy = RetryPolicy::new(RetryConfig::builder().max_retries(2).build());
        assert!(matches!(policy.decide(2, &outcome(503)), RetryDecision::Retry { .. }));
        assert_eq!(policy.decide(3, &outcome(503)), RetryDecision::Stop);
    }

    #[test]
    fn retry_after_overrides_computed_delay() {
        let policy = RetryPolicy::new(
            RetryConfig::builder()
                .base_delay(Duration::from_secs(1))
                .build(),
        );
        let outcome = AttemptOutcome {
            status: Some(429),
            transport_error: false,
            timed_out: false,
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            policy.decide(1, &outcome),
            RetryDecision::Retry {
                delay: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn retry_after_is_clamped_to_max_delay() {
        let policy = RetryPolicy::new(RetryConfig::builder().max_delay(Duration::from_secs(5)).build());
        let outcome = AttemptOutcome {
            status: Some(429),
            transport_error: false,
            timed_out: false,
            retry_after: Some(Duration::from_secs(999)),
        };
        assert_eq!(
            policy.decide(1, &outcome),
            RetryDecision::Retry {
                delay: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn transport_errors_and_timeouts_are_retryable() {
        let policy = RetryPolicy::new(RetryConfig::builder().build());
        let transport = AttemptOutcome {
            status: None,
            transport_error: true,
            timed_out: false,
            retry_after: None,
        };
        let timeout = AttemptOutcome {
            status: None,
            transport_error: false,
            timed_out: true,
            retry_after: None,
        };
        assert!(matches!(policy.decide(1, &transport), RetryDecision::Retry { .. }));
        assert!(matches!(policy.decide(1, &timeout), RetryDecision::Retry { .. }));
    }

    #[test]
    fn override_max_retries_zero_suppresses_retry() {
        let policy = RetryPolicy::new(RetryConfig::builder().max_retries(5).build());
        let override_ = RetryOverride {
            max_retries: Some(0),
            base_delay: None,
            max_delay: None,
        };
        assert_eq!(policy.decide_with_override(1, &outcome(503), &override_), RetryDecision::Stop);
    }

    #[test]
    fn override_base_delay_changes_computed_backoff() {
        let policy = RetryPolicy::new(RetryConfig::builder().base_delay(Duration::from_secs(1)).randomization_factor(0.0).build());
        let override_ = RetryOverride {
            max_retries: None,
            base_delay: Some(Duration::from_millis(10)),
            max_delay: None,
        };
        assert_eq!(
            policy.decide_with_override(1, &outcome(503), &override_),
            RetryDecision::Retry {
                delay: Duration::from_millis(10)
            }
        );
    }

    #[test]
    fn no_override_behaves_like_decide() {
        let policy = RetryPolicy::new(RetryConfig::builder().max_retries(1).randomization_factor(0.0).build());
        assert_eq!(
            policy.decide_with_override(1, &outcome(503), &RetryOverride::default()),
            policy.decide(1, &outcome(503))
        );
    }

    #[test]
    fn emits_retry_event() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let policy = RetryPolicy::new(RetryConfig::builder().on_retry(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        }).build());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        policy.decide_and_emit(1, &outcome(503), "api.example.com", &clock);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
