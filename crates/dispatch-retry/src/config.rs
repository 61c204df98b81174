use crate::events::RetryEvent;
use dispatch_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for the retry decision function (§4.5).
pub struct RetryConfig {
    pub(crate) max_retries: u32,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) randomization_factor: f64,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    randomization_factor: f64,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_retries: 3 (so up to 4 total attempts)
    /// - base_delay: 500ms
    /// - max_delay: 60 seconds
    /// - randomization_factor: 0.25 (±25% jitter)
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            randomization_factor: 0.25,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the maximum number of retries after the initial attempt.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Sets the base delay used by the exponential backoff formula.
    pub fn base_delay(mut self, duration: Duration) -> Self {
        self.base_delay = duration;
        self
    }

    /// Sets the ceiling the computed (and `Retry-After`-overridden) delay is capped at.
    pub fn max_delay(mut self, duration: Duration) -> Self {
        self.max_delay = duration;
        self
    }

    /// Sets the jitter fraction applied to the computed delay.
    ///
    /// 0.25 randomizes the delay within ±25% of its nominal value.
    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    /// Gives this policy a human-readable name for observability.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when an attempt will be retried.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked when retries are exhausted.
    pub fn on_retries_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::RetriesExhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            randomization_factor: self.randomization_factor,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl RetryConfig {
    /// Starts building a new configuration.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }
}
