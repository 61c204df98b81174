use dispatch_core::DispatchEvent;
use std::time::Instant;

/// Events emitted by a [`crate::Cache`] (§6's `cache_hit` plus internal
/// observability not named in the event stream).
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// `get` (or the cached fast-path of `get_or_compute`) found a live entry.
    Hit { cache_name: String, timestamp: Instant },
    /// `get` found nothing, or found an expired entry.
    Miss { cache_name: String, timestamp: Instant },
    /// An insert pushed the store past `max_entries`, evicting the LRU entry.
    Eviction { cache_name: String, timestamp: Instant },
    /// A concurrent `get_or_compute` call joined an in-flight computation
    /// instead of starting its own (§4.3's single-flight guarantee).
    SingleFlightJoined { cache_name: String, timestamp: Instant },
}

impl DispatchEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Eviction { .. } => "eviction",
            CacheEvent::SingleFlightJoined { .. } => "single_flight_joined",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Eviction { timestamp, .. }
            | CacheEvent::SingleFlightJoined { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            CacheEvent::Hit { cache_name, .. }
            | CacheEvent::Miss { cache_name, .. }
            | CacheEvent::Eviction { cache_name, .. }
            | CacheEvent::SingleFlightJoined { cache_name, .. } => cache_name,
        }
    }
}
