//! Metrics aggregation, threshold alerting, and health derivation (§4.8).
//!
//! The `Monitor` is the observation side-channel every other dispatch-engine
//! component reports into: counters (`requests.submitted`, `cache.hits`,
//! ...), gauges (`queue.size`, `inflight`, ...), and histograms
//! (`request.duration`, `queue.wait`). Thresholds registered against those
//! metrics are evaluated on a fixed `collect_interval`, producing
//! [`Alert`]s that feed a derived [`dispatch_core::HealthState`] and any
//! number of pluggable [`AlertSink`]s.
//!
//! # Example
//!
//! ```
//! use dispatch_monitor::{Comparator, Monitor, Severity, Threshold};
//! use dispatch_core::HealthState;
//! use std::time::Instant;
//!
//! let monitor = Monitor::new("engine");
//! monitor.register_threshold(Threshold::new("queue.size", Comparator::GreaterThan, 1000.0, Severity::High));
//! monitor.set_gauge("queue.size", 1500.0);
//! monitor.collect(Instant::now());
//! assert_eq!(monitor.health(), HealthState::Degraded);
//! ```

mod alert;
mod events;
mod monitor;
mod registry;
mod sink;
mod threshold;

pub use alert::{Alert, AlertStatus, Severity};
pub use events::MonitorEvent;
pub use monitor::Monitor;
pub use registry::{HistogramSummary, MetricPoint, MetricType, MetricsRegistry};
pub use sink::{AlertSink, FnSink};
pub use threshold::{Comparator, Threshold};
