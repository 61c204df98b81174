use crate::events::TokenBucketEvent;
use dispatch_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`crate::TokenBucket`].
pub struct TokenBucketConfig {
    pub(crate) refill_rate: f64,
    pub(crate) capacity: f64,
    pub(crate) event_listeners: EventListeners<TokenBucketEvent>,
    pub(crate) name: String,
}

/// Builder for [`TokenBucketConfig`].
pub struct TokenBucketConfigBuilder {
    refill_rate: f64,
    capacity: Option<f64>,
    event_listeners: EventListeners<TokenBucketEvent>,
    name: String,
}

impl Default for TokenBucketConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBucketConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - refill_rate: 50 tokens/sec
    /// - capacity: equal to refill_rate (one second's worth of burst)
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            refill_rate: 50.0,
            capacity: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the refill rate, in tokens per second.
    pub fn refill_rate(mut self, tokens_per_second: f64) -> Self {
        self.refill_rate = tokens_per_second;
        self
    }

    /// Sets the bucket capacity. If not called, capacity defaults to
    /// `refill_rate` (one second's worth of burst).
    pub fn capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the name for this bucket instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked whenever tokens are granted.
    pub fn on_tokens_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TokenBucketEvent::TokensAcquired {
                tokens,
                wait_duration,
                ..
            } = event
            {
                f(*tokens, *wait_duration);
            }
        }));
        self
    }

    /// Registers a callback invoked whenever an acquisition is canceled.
    pub fn on_acquire_canceled<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TokenBucketEvent::AcquireCanceled { tokens, .. } = event {
                f(*tokens);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> TokenBucketConfig {
        TokenBucketConfig {
            refill_rate: self.refill_rate,
            capacity: self.capacity.unwrap_or(self.refill_rate),
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl TokenBucketConfig {
    /// Starts building a new configuration.
    pub fn builder() -> TokenBucketConfigBuilder {
        TokenBucketConfigBuilder::new()
    }
}

/// Convenience constructor matching the workspace's `Arc<dyn Clock>` convention.
pub(crate) fn default_system_clock() -> Arc<dyn dispatch_core::Clock> {
    Arc::new(dispatch_core::SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = TokenBucketConfig::builder().build();
        assert_eq!(config.refill_rate, 50.0);
        assert_eq!(config.capacity, 50.0);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = TokenBucketConfig::builder()
            .refill_rate(100.0)
            .capacity(200.0)
            .name("test-bucket")
            .build();
        assert_eq!(config.refill_rate, 100.0);
        assert_eq!(config.capacity, 200.0);
        assert_eq!(config.name, "test-bucket");
    }

    #[test]
    fn test_event_listeners() {
        let config = TokenBucketConfig::builder()
            .on_tokens_acquired(|_, _| {})
            .on_acquire_canceled(|_| {})
            .build();
        assert_eq!(config.event_listeners.len(), 2);
    }
}
