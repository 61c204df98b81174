use crate::alert::{Alert, AlertStatus, Severity};
use crate::events::MonitorEvent;
use crate::registry::MetricsRegistry;
use crate::sink::{notify_guarded, AlertSink};
use crate::threshold::Threshold;
use dispatch_core::events::EventListeners;
use dispatch_core::HealthState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_ALERT_HISTORY_CAPACITY: usize = 1000;

struct ThresholdState {
    threshold: Threshold,
    current: Option<Alert>,
}

/// Metrics aggregation, threshold alerting, and health derivation (§4.8).
///
/// Owned by the dispatch engine's `Coordinator`, which forwards counters,
/// gauges, and histograms from every other component as work happens, and
/// periodically calls [`Monitor::collect`] (directly, or via
/// [`Monitor::spawn_collector`]) to evaluate registered thresholds.
pub struct Monitor {
    name: String,
    registry: MetricsRegistry,
    thresholds: Mutex<Vec<ThresholdState>>,
    sinks: Mutex<Vec<Arc<dyn AlertSink>>>,
    event_listeners: EventListeners<MonitorEvent>,
    history: Mutex<VecDeque<Alert>>,
    history_capacity: usize,
    next_alert_id: AtomicU64,
}

impl Monitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: MetricsRegistry::new(),
            thresholds: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
            event_listeners: EventListeners::new(),
            history: Mutex::new(VecDeque::new()),
            history_capacity: DEFAULT_ALERT_HISTORY_CAPACITY,
            next_alert_id: AtomicU64::new(1),
        }
    }

    /// Registers a threshold to be evaluated on every [`Monitor::collect`].
    pub fn register_threshold(&self, threshold: Threshold) {
        self.thresholds.lock().push(ThresholdState {
            threshold,
            current: None,
        });
    }

    /// Adds a delivery sink, invoked on every alert firing/resolution.
    pub fn add_sink(&self, sink: Arc<dyn AlertSink>) {
        self.sinks.lock().push(sink);
    }

    /// Registers a listener for [`MonitorEvent`]s (used internally by the
    /// engine's own structured-event stream; sinks are for external
    /// delivery such as paging).
    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: dispatch_core::events::EventListener<MonitorEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    pub fn increment_counter(&self, name: &str, n: u64) {
        self.registry.increment_counter(name, n);
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        self.registry.set_gauge(name, value);
    }

    pub fn record_histogram(&self, name: &str, value: f64) {
        self.registry.record_histogram(name, value);
    }

    pub fn counter_value(&self, name: &str) -> u64 {
        self.registry.counter_value(name)
    }

    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.registry.gauge_value(name)
    }

    /// Resolves a named metric to a sampleable scalar: a gauge's latest
    /// value, a counter's running total, or a histogram's p99 (the
    /// statistic most threshold checks on latency actually want).
    fn sample(&self, metric_name: &str) -> Option<f64> {
        if let Some(v) = self.registry.gauge_value(metric_name) {
            return Some(v);
        }
        if let Some(summary) = self.registry.histogram_summary(metric_name) {
            return Some(summary.p99);
        }
        let counter = self.registry.counter_value(metric_name);
        if counter > 0 {
            Some(counter as f64)
        } else {
            None
        }
    }

    /// Evaluates every registered threshold against the current metric
    /// snapshot, firing or resolving alerts as needed.
    pub fn collect(&self, now: Instant) {
        let mut thresholds = self.thresholds.lock();
        for state in thresholds.iter_mut() {
            let Some(sample) = self.sample(&state.threshold.metric_name) else {
                continue;
            };
            let crossed = state.threshold.is_crossed(sample);
            match (&mut state.current, crossed) {
                (None, true) => {
                    let alert = Alert {
                        id: self.next_alert_id.fetch_add(1, Ordering::SeqCst),
                        severity: state.threshold.severity,
                        metric_name: state.threshold.metric_name.clone(),
                        observed_value: sample,
                        threshold_value: state.threshold.value,
                        timestamp: now,
                        status: AlertStatus::Firing,
                    };
                    self.dispatch_transition(&alert, true);
                    state.current = Some(alert);
                }
                (Some(existing), false) => {
                    let mut resolved = existing.clone();
                    resolved.status = AlertStatus::Resolved;
                    resolved.timestamp = now;
                    resolved.observed_value = sample;
                    self.dispatch_transition(&resolved, false);
                    state.current = None;
                }
                _ => {}
            }
        }
    }

    fn dispatch_transition(&self, alert: &Alert, firing: bool) {
        self.event_listeners
            .emit(&MonitorEvent::from_alert(&self.name, alert, firing));
        let sinks = self.sinks.lock();
        for sink in sinks.iter() {
            notify_guarded(sink.as_ref(), alert, firing);
        }
        drop(sinks);
        let mut history = self.history.lock();
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(alert.clone());
    }

    /// Currently-firing alerts (§4.8's health derivation input).
    pub fn firing_alerts(&self) -> Vec<Alert> {
        self.thresholds
            .lock()
            .iter()
            .filter_map(|s| s.current.clone())
            .collect()
    }

    pub fn alert_history(&self) -> Vec<Alert> {
        self.history.lock().iter().cloned().collect()
    }

    /// Derives overall health from the firing alert set: any `CRITICAL`
    /// makes the system `Unhealthy`; any `HIGH` (with no `CRITICAL`) makes
    /// it `Degraded`; otherwise `Healthy`.
    pub fn health(&self) -> HealthState {
        let thresholds = self.thresholds.lock();
        let mut worst = HealthState::Healthy;
        for state in thresholds.iter() {
            let Some(alert) = &state.current else { continue };
            let candidate = match alert.severity {
                Severity::Critical => HealthState::Unhealthy,
                Severity::High => HealthState::Degraded,
                Severity::Medium | Severity::Low => HealthState::Healthy,
            };
            worst = worst.max(candidate);
        }
        worst
    }

    /// Spawns a background task that calls [`Monitor::collect`] every
    /// `interval` until the returned handle is aborted or dropped.
    pub fn spawn_collector(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.collect(Instant::now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Comparator;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn gauge_crossing_threshold_fires_alert() {
        let monitor = Monitor::new("test");
        monitor.register_threshold(Threshold::new(
            "queue.size",
            Comparator::GreaterThan,
            100.0,
            Severity::High,
        ));
        monitor.set_gauge("queue.size", 50.0);
        monitor.collect(Instant::now());
        assert!(monitor.firing_alerts().is_empty());
        assert_eq!(monitor.health(), HealthState::Healthy);

        monitor.set_gauge("queue.size", 150.0);
        monitor.collect(Instant::now());
        assert_eq!(monitor.firing_alerts().len(), 1);
        assert_eq!(monitor.health(), HealthState::Degraded);
    }

    #[test]
    fn alert_resolves_when_back_in_bounds() {
        let monitor = Monitor::new("test");
        monitor.register_threshold(Threshold::new(
            "queue.size",
            Comparator::GreaterThan,
            100.0,
            Severity::Critical,
        ));
        monitor.set_gauge("queue.size", 150.0);
        monitor.collect(Instant::now());
        assert_eq!(monitor.health(), HealthState::Unhealthy);

        monitor.set_gauge("queue.size", 10.0);
        monitor.collect(Instant::now());
        assert!(monitor.firing_alerts().is_empty());
        assert_eq!(monitor.health(), HealthState::Healthy);
    }

    #[test]
    fn critical_outranks_high_in_health() {
        let monitor = Monitor::new("test");
        monitor.register_threshold(Threshold::new("a", Comparator::GreaterThan, 1.0, Severity::High));
        monitor.register_threshold(Threshold::new("b", Comparator::GreaterThan, 1.0, Severity::Critical));
        monitor.set_gauge("a", 5.0);
        monitor.set_gauge("b", 5.0);
        monitor.collect(Instant::now());
        assert_eq!(monitor.health(), HealthState::Unhealthy);
    }

    #[test]
    fn sink_panic_does_not_prevent_other_sinks() {
        use crate::sink::FnSink;

        let monitor = Monitor::new("test");
        monitor.register_threshold(Threshold::new("a", Comparator::GreaterThan, 1.0, Severity::High));
        monitor.add_sink(Arc::new(FnSink::new(|_: &Alert, _: bool| panic!("boom"))));

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        monitor.add_sink(Arc::new(FnSink::new(move |_: &Alert, _: bool| {
            c.fetch_add(1, Ordering::SeqCst);
        })));

        monitor.set_gauge("a", 5.0);
        monitor.collect(Instant::now());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
