//! A priority-aware, rate-limited, fault-tolerant HTTP request dispatcher.
//!
//! `dispatch-engine` composes a priority queue, a global token-bucket rate
//! limiter, per-origin circuit breakers, an exponential-backoff retry
//! policy, a single-flight response cache, and a metrics/alerting monitor
//! into one [`coordinator::Coordinator`] that accepts [`descriptor::RequestDescriptor`]s
//! and drives them to completion against a pluggable [`transport::Transport`].
//!
//! # Example
//!
//! ```no_run
//! use dispatch_engine::{Coordinator, EngineConfig, Method, Priority, RequestDescriptor};
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! # async fn example(transport: Arc<dyn dispatch_engine::Transport>) {
//! let coordinator = Coordinator::new(EngineConfig::default(), transport);
//! coordinator.start().unwrap();
//!
//! let descriptor = RequestDescriptor::builder(Method::Get, "https://api.example.com/widgets")
//!     .build(Instant::now());
//! let handle = coordinator.submit(descriptor, Priority::Normal).unwrap();
//! let record = handle.wait().await.unwrap();
//! println!("status: {:?}", record.status);
//!
//! coordinator.stop(Duration::from_secs(5)).await;
//! # }
//! ```

mod config;
mod coordinator;
mod deadletter;
mod descriptor;
mod dispatcher;
mod error;
mod events;
mod response;
mod snapshot;
mod transport;

pub use config::{EngineConfig, EngineConfigBuilder, ThresholdComparator, ThresholdSeverity, ThresholdSpec};
pub use coordinator::{Coordinator, CoordinatorBuilder, EngineStatus, SubmitHandle};
pub use deadletter::{DeadLetterEntry, DeadLetterQueue};
pub use descriptor::{Headers, Method, Priority, RequestDescriptor, RequestDescriptorBuilder, RetryOverrides};
pub use error::EngineError;
pub use events::EngineEvent;
pub use response::{Outcome, ResponseRecord};
pub use transport::{ErrorKind, Transport, TransportOutcome};

pub use dispatch_circuitbreaker::CircuitState;
pub use dispatch_core::{Clock, HealthState, ManualClock, Origin, SystemClock};
pub use dispatch_monitor::{Alert, AlertSink, Severity as AlertSeverity};
