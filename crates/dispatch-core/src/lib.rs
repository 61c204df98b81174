//! Shared infrastructure for the dispatch engine's component crates.
//!
//! - `events`: observability plumbing (`EventListener`, `EventListeners`, `FnListener`)
//! - `clock`: an injectable, mockable time source
//! - `origin`: the `(scheme, host, port)` key used by the circuit breaker registry
//! - `health`: the derived health scalar shared by the monitor and the coordinator

pub mod clock;
pub mod events;
pub mod health;
pub mod origin;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{BoxedEventListener, DispatchEvent, EventListener, EventListeners, FnListener};
pub use health::HealthState;
pub use origin::Origin;
