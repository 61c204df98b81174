use crate::circuit::CircuitState;
use dispatch_core::DispatchEvent;
use std::time::Instant;

/// Events emitted by a per-origin circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted through the breaker.
    CallPermitted {
        origin_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    CallRejected {
        origin_name: String,
        timestamp: Instant,
    },
    /// The breaker transitioned between states.
    StateTransition {
        origin_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        origin_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failed call was recorded.
    FailureRecorded {
        origin_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl DispatchEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { origin_name, .. }
            | CircuitBreakerEvent::CallRejected { origin_name, .. }
            | CircuitBreakerEvent::StateTransition { origin_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { origin_name, .. }
            | CircuitBreakerEvent::FailureRecorded { origin_name, .. } => origin_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let now = Instant::now();
        let name = "api.example.com".to_string();

        let call_permitted = CircuitBreakerEvent::CallPermitted {
            origin_name: name.clone(),
            timestamp: now,
            state: CircuitState::Closed,
        };
        assert_eq!(call_permitted.event_type(), "call_permitted");
        assert_eq!(call_permitted.component_name(), "api.example.com");

        let call_rejected = CircuitBreakerEvent::CallRejected {
            origin_name: name.clone(),
            timestamp: now,
        };
        assert_eq!(call_rejected.event_type(), "call_rejected");

        let state_transition = CircuitBreakerEvent::StateTransition {
            origin_name: name.clone(),
            timestamp: now,
            from_state: CircuitState::Closed,
            to_state: CircuitState::Open,
        };
        assert_eq!(state_transition.event_type(), "state_transition");

        let success = CircuitBreakerEvent::SuccessRecorded {
            origin_name: name.clone(),
            timestamp: now,
            state: CircuitState::Closed,
        };
        assert_eq!(success.event_type(), "success_recorded");

        let failure = CircuitBreakerEvent::FailureRecorded {
            origin_name: name,
            timestamp: now,
            state: CircuitState::Closed,
        };
        assert_eq!(failure.event_type(), "failure_recorded");
    }

    #[test]
    fn test_event_timestamp() {
        let now = Instant::now();
        let event = CircuitBreakerEvent::CallPermitted {
            origin_name: "api.example.com".to_string(),
            timestamp: now,
            state: CircuitState::Closed,
        };
        assert_eq!(event.timestamp(), now);
    }
}
