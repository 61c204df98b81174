use crate::events::CircuitBreakerEvent;
use dispatch_core::Clock;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Instant;

/// The three states a single origin's circuit can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-origin breaker state (§4.4). Tracks consecutive failures rather than
/// a windowed failure rate — simpler than a sliding window, and sufficient
/// for the admission decision this breaker exists to make.
pub(crate) struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_success: u32,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_in_flight: 0,
            half_open_success: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// Decides whether a call may proceed, advancing OPEN -> HALF_OPEN when
    /// the timeout has elapsed. Returns `true` if the caller should proceed
    /// (and, for HALF_OPEN, has claimed one of the limited probe slots).
    pub(crate) fn admit(
        &mut self,
        now: Instant,
        breaker_timeout: std::time::Duration,
        half_open_max_calls: u32,
    ) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                if now.saturating_duration_since(opened_at) >= breaker_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_in_flight = 0;
                    self.half_open_success = 0;
                    self.admit(now, breaker_timeout, half_open_max_calls)
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_in_flight < half_open_max_calls {
                    self.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a success, returning `Some(previous_state)` if this call
    /// caused a state transition.
    pub(crate) fn record_success(&mut self, probe_required: u32) -> Option<CircuitState> {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                self.half_open_success += 1;
                if self.half_open_success >= probe_required {
                    self.close();
                    Some(CircuitState::HalfOpen)
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    /// Records a failure, returning `Some(previous_state)` if this call
    /// caused a state transition.
    pub(crate) fn record_failure(&mut self, now: Instant, failure_threshold: u32) -> Option<CircuitState> {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= failure_threshold {
                    self.open(now);
                    Some(CircuitState::Closed)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                self.open(now);
                Some(CircuitState::HalfOpen)
            }
            CircuitState::Open => None,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.consecutive_failures = 0;
        self.half_open_in_flight = 0;
        self.half_open_success = 0;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.consecutive_failures = 0;
        self.half_open_in_flight = 0;
        self.half_open_success = 0;
    }

    /// Called when a half-open probe completes without claiming its slot
    /// permanently (used by the registry if a probe is abandoned, e.g. the
    /// dispatcher cancels the attempt before the transport responds).
    pub(crate) fn release_half_open_slot(&mut self) {
        if self.state == CircuitState::HalfOpen && self.half_open_in_flight > 0 {
            self.half_open_in_flight -= 1;
        }
    }
}

#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn state_name(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    }
}

pub(crate) struct TransitionContext<'a> {
    pub(crate) origin_name: &'a str,
    pub(crate) clock: &'a Arc<dyn Clock>,
}

pub(crate) fn emit_transition(
    ctx: &TransitionContext<'_>,
    listeners: &dispatch_core::events::EventListeners<CircuitBreakerEvent>,
    from: CircuitState,
    to: CircuitState,
) {
    #[cfg(feature = "tracing")]
    tracing::debug!(origin = ctx.origin_name, from = state_name(from), to = state_name(to), "circuit state transition");
    #[cfg(feature = "metrics")]
    {
        gauge!("dispatch_circuit_state", "origin" => ctx.origin_name.to_string()).set(match to {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        });
        counter!("dispatch_circuit_transitions_total", "origin" => ctx.origin_name.to_string()).increment(1);
    }
    listeners.emit(&CircuitBreakerEvent::StateTransition {
        origin_name: ctx.origin_name.to_string(),
        timestamp: ctx.clock.now(),
        from_state: from,
        to_state: to,
    });
}
