//! Per-origin circuit breaking for the dispatch engine (§4.4).
//!
//! Unlike a breaker wrapped around one typed service, this crate keys a
//! breaker by [`Origin`](dispatch_core::Origin) and keeps a registry of
//! them, since the engine dispatches requests to many origins through one
//! shared worker pool. Each origin's circuit tracks consecutive failures
//! rather than a windowed failure rate:
//!
//! - **Closed**: calls are admitted; `failure_threshold` consecutive
//!   failures trips it open.
//! - **Open**: calls are rejected until `breaker_timeout` elapses, then the
//!   next admission check moves to half-open.
//! - **Half-open**: up to `half_open_max_calls` probes are admitted;
//!   `probe_required` consecutive successes close the circuit, any failure
//!   reopens it.
//!
//! # Example
//!
//! ```
//! use dispatch_circuitbreaker::{CircuitBreakerConfig, CircuitRegistry};
//! use dispatch_core::Origin;
//!
//! let registry = CircuitRegistry::with_system_clock(
//!     CircuitBreakerConfig::builder().failure_threshold(3).build(),
//! );
//! let origin = Origin::new("https", "api.example.com", 443);
//! assert!(registry.admit(&origin));
//! registry.record_success(&origin);
//! ```

mod circuit;
mod config;
mod events;
mod registry;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
pub use registry::CircuitRegistry;
