//! The engine's structured event stream (§6): one variant per event kind
//! the spec names, each carrying the descriptor id, a timestamp, and
//! kind-specific payload. `dispatch_monitor::MonitorEvent`s (alert firing/
//! resolution) are forwarded onto this same stream by the `Coordinator`.

use crate::response::Outcome;
use dispatch_circuitbreaker::CircuitState;
use dispatch_core::events::DispatchEvent;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EngineEvent {
    Submitted {
        request_id: Uuid,
        timestamp: Instant,
    },
    Dequeued {
        request_id: Uuid,
        timestamp: Instant,
        attempt: u32,
    },
    CacheHit {
        request_id: Uuid,
        timestamp: Instant,
    },
    BreakerRejected {
        request_id: Uuid,
        timestamp: Instant,
        origin: String,
    },
    Attempted {
        request_id: Uuid,
        timestamp: Instant,
        attempt: u32,
        status: Option<u16>,
    },
    Succeeded {
        request_id: Uuid,
        timestamp: Instant,
        attempts: u32,
    },
    Failed {
        request_id: Uuid,
        timestamp: Instant,
        outcome: Outcome,
    },
    RetryScheduled {
        request_id: Uuid,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
    },
    DeadLettered {
        request_id: Uuid,
        timestamp: Instant,
        outcome: Outcome,
    },
    AlertFiring {
        timestamp: Instant,
        monitor_name: String,
        metric_name: String,
    },
    AlertResolved {
        timestamp: Instant,
        monitor_name: String,
        metric_name: String,
    },
    /// A circuit transitioned state; mirrors `dispatch_circuitbreaker`'s own
    /// event but reported on the engine-wide stream for external sinks that
    /// only want to watch one channel.
    BreakerStateChanged {
        timestamp: Instant,
        origin: String,
        from: CircuitState,
        to: CircuitState,
    },
}

impl DispatchEvent for EngineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::Submitted { .. } => "submitted",
            EngineEvent::Dequeued { .. } => "dequeued",
            EngineEvent::CacheHit { .. } => "cache_hit",
            EngineEvent::BreakerRejected { .. } => "breaker_rejected",
            EngineEvent::Attempted { .. } => "attempted",
            EngineEvent::Succeeded { .. } => "succeeded",
            EngineEvent::Failed { .. } => "failed",
            EngineEvent::RetryScheduled { .. } => "retry_scheduled",
            EngineEvent::DeadLettered { .. } => "dead_lettered",
            EngineEvent::AlertFiring { .. } => "alert_firing",
            EngineEvent::AlertResolved { .. } => "alert_resolved",
            EngineEvent::BreakerStateChanged { .. } => "breaker_state_changed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            EngineEvent::Submitted { timestamp, .. }
            | EngineEvent::Dequeued { timestamp, .. }
            | EngineEvent::CacheHit { timestamp, .. }
            | EngineEvent::BreakerRejected { timestamp, .. }
            | EngineEvent::Attempted { timestamp, .. }
            | EngineEvent::Succeeded { timestamp, .. }
            | EngineEvent::Failed { timestamp, .. }
            | EngineEvent::RetryScheduled { timestamp, .. }
            | EngineEvent::DeadLettered { timestamp, .. }
            | EngineEvent::AlertFiring { timestamp, .. }
            | EngineEvent::AlertResolved { timestamp, .. }
            | EngineEvent::BreakerStateChanged { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        "dispatch-engine"
    }
}
