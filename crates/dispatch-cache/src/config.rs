//! Configuration for [`crate::Cache`].

use crate::events::CacheEvent;
use dispatch_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a computed value is worth caching at all (§3: "Cache
/// stores only responses whose status is 2xx by default; policy is
/// configurable"). Defaults to caching everything; the dispatch engine's
/// root crate supplies a predicate that checks `ResponseRecord::status`.
pub type CacheableFn<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Configuration for a [`crate::Cache`] instance.
pub struct CacheConfig<V> {
    pub(crate) max_entries: usize,
    pub(crate) ttl: Option<Duration>,
    pub(crate) cacheable: CacheableFn<V>,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
    pub(crate) name: String,
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder<V> {
    max_entries: usize,
    ttl: Option<Duration>,
    cacheable: CacheableFn<V>,
    event_listeners: EventListeners<CacheEvent>,
    name: String,
}

impl<V> CacheConfigBuilder<V> {
    /// Creates a new builder with defaults: 100 entries, no TTL, caches
    /// everything computed.
    pub fn new() -> Self {
        Self {
            max_entries: 100,
            ttl: None,
            cacheable: Arc::new(|_| true),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the maximum number of entries (`cache_max_entries`). Default: 100.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Sets the TTL after which an entry is treated as expired
    /// (`cache_ttl_seconds`). Default: no expiration.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the predicate deciding whether a computed value is cached.
    pub fn cacheable<F>(mut self, f: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.cacheable = Arc::new(f);
        self
    }

    /// Names this cache instance for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked on every cache hit.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Hit { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked on every cache miss.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Miss { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked whenever an insert evicts the LRU entry.
    pub fn on_eviction<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Eviction { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CacheConfig<V> {
        CacheConfig {
            max_entries: self.max_entries,
            ttl: self.ttl,
            cacheable: self.cacheable,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl<V> Default for CacheConfigBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheConfig<V> {
    /// Starts building a new configuration.
    pub fn builder() -> CacheConfigBuilder<V> {
        CacheConfigBuilder::new()
    }
}
