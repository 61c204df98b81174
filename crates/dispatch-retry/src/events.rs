use dispatch_core::DispatchEvent;
use std::time::{Duration, Instant};

/// Events emitted by the retry decision function as it's applied per attempt.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt will be retried after `delay`.
    Retry {
        origin_name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    /// All attempts were exhausted without a retryable path forward.
    RetriesExhausted {
        origin_name: String,
        timestamp: Instant,
        attempts: u32,
    },
}

impl DispatchEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. } | RetryEvent::RetriesExhausted { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            RetryEvent::Retry { origin_name, .. } | RetryEvent::RetriesExhausted { origin_name, .. } => origin_name,
        }
    }
}
