use crate::circuit::{emit_transition, Circuit, CircuitState, TransitionContext};
use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use dispatch_core::{Clock, Origin};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A breaker per origin (§4.4), sharing one configuration.
///
/// Origins are created lazily on first admission check and live for the
/// registry's lifetime; the spec doesn't call for eviction of idle origins,
/// so none is implemented.
pub struct CircuitRegistry {
    circuits: Mutex<HashMap<Origin, Circuit>>,
    config: Arc<CircuitBreakerConfig>,
    clock: Arc<dyn Clock>,
}

impl CircuitRegistry {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config: Arc::new(config),
            clock,
        }
    }

    /// Convenience constructor using the real system clock.
    pub fn with_system_clock(config: CircuitBreakerConfig) -> Self {
        Self::new(config, Arc::new(dispatch_core::SystemClock))
    }

    /// Returns whether a call to `origin` may proceed right now. For
    /// HALF_OPEN this claims one of the limited probe slots on `true`.
    pub fn admit(&self, origin: &Origin) -> bool {
        let now = self.clock.now();
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(origin.clone()).or_insert_with(Circuit::new);
        let before = circuit.state();
        let admitted = circuit.admit(now, self.config.breaker_timeout, self.config.half_open_max_calls);
        let after = circuit.state();
        if before != after {
            self.emit_transition(origin, before, after);
        }
        if admitted {
            self.config.event_listeners.emit(&CircuitBreakerEvent::CallPermitted {
                origin_name: origin.to_string(),
                timestamp: now,
                state: after,
            });
        } else {
            self.config.event_listeners.emit(&CircuitBreakerEvent::CallRejected {
                origin_name: origin.to_string(),
                timestamp: now,
            });
        }
        admitted
    }

    /// Records a successful call against `origin`'s circuit.
    pub fn record_success(&self, origin: &Origin) {
        let now = self.clock.now();
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(origin.clone()).or_insert_with(Circuit::new);
        let before = circuit.state();
        circuit.record_success(self.config.probe_required);
        let after = circuit.state();
        drop(circuits);
        self.config.event_listeners.emit(&CircuitBreakerEvent::SuccessRecorded {
            origin_name: origin.to_string(),
            timestamp: now,
            state: after,
        });
        if before != after {
            self.emit_transition(origin, before, after);
        }
    }

    /// Records a failed call against `origin`'s circuit.
    pub fn record_failure(&self, origin: &Origin) {
        let now = self.clock.now();
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(origin.clone()).or_insert_with(Circuit::new);
        let before = circuit.state();
        circuit.record_failure(now, self.config.failure_threshold);
        let after = circuit.state();
        drop(circuits);
        self.config.event_listeners.emit(&CircuitBreakerEvent::FailureRecorded {
            origin_name: origin.to_string(),
            timestamp: now,
            state: after,
        });
        if before != after {
            self.emit_transition(origin, before, after);
        }
    }

    /// Releases a claimed half-open probe slot without recording an outcome
    /// (used when an attempt is abandoned before the transport responds).
    pub fn release_half_open_slot(&self, origin: &Origin) {
        let mut circuits = self.circuits.lock();
        if let Some(circuit) = circuits.get_mut(origin) {
            circuit.release_half_open_slot();
        }
    }

    /// Returns the current state of `origin`'s circuit, `Closed` if unseen.
    pub fn state(&self, origin: &Origin) -> CircuitState {
        self.circuits
            .lock()
            .get(origin)
            .map(|c| c.state())
            .unwrap_or(CircuitState::Closed)
    }

    fn emit_transition(&self, origin: &Origin, from: CircuitState, to: CircuitState) {
        let name = origin.to_string();
        let ctx = TransitionContext {
            origin_name: &name,
            clock: &self.clock,
        };
        emit_transition(&ctx, &self.config.event_listeners, from, to);
    }
}
