use dispatch_core::DispatchEvent;
use std::time::{Duration, Instant};

/// Events emitted by a [`crate::TokenBucket`] on every acquisition attempt.
#[derive(Debug, Clone)]
pub enum TokenBucketEvent {
    /// Tokens were granted, possibly after waiting `wait_duration` for refill.
    TokensAcquired {
        bucket_name: String,
        timestamp: Instant,
        tokens: u32,
        wait_duration: Duration,
    },
    /// The caller's cancellation token fired before tokens became available.
    AcquireCanceled {
        bucket_name: String,
        timestamp: Instant,
        tokens: u32,
    },
}

impl DispatchEvent for TokenBucketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::TokensAcquired { .. } => "tokens_acquired",
            Self::AcquireCanceled { .. } => "acquire_canceled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::TokensAcquired { timestamp, .. } => *timestamp,
            Self::AcquireCanceled { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            Self::TokensAcquired { bucket_name, .. } => bucket_name,
            Self::AcquireCanceled { bucket_name, .. } => bucket_name,
        }
    }
}
