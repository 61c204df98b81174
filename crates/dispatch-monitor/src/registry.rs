//! Metric collectors (§3's `MetricPoint`, §4.8's counters/gauges/histograms).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

/// The kind of a [`MetricPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// One observation of a metric, as would be handed to a pluggable exporter.
#[derive(Debug, Clone)]
pub struct MetricPoint {
    pub name: String,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: Instant,
    pub labels: HashMap<String, String>,
}

/// A histogram's point-in-time summary: count, sum, min, max, and a few
/// percentiles computed from the retained sample window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl HistogramSummary {
    fn empty() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: 0.0,
            max: 0.0,
            p50: 0.0,
            p90: 0.0,
            p99: 0.0,
        }
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// A histogram retaining a bounded window of recent samples for percentile
/// estimation (exact, not sketch-based — sufficient at this crate's scale).
struct Histogram {
    samples: Vec<f64>,
    capacity: usize,
    count: u64,
    sum: f64,
}

const HISTOGRAM_WINDOW: usize = 4096;

impl Histogram {
    fn new() -> Self {
        Self {
            samples: Vec::new(),
            capacity: HISTOGRAM_WINDOW,
            count: 0,
            sum: 0.0,
        }
    }

    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if self.samples.len() >= self.capacity {
            self.samples.remove(0);
        }
        self.samples.push(value);
    }

    fn summary(&self) -> HistogramSummary {
        if self.samples.is_empty() {
            return HistogramSummary::empty();
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let percentile = |p: f64| -> f64 {
            let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
            sorted[idx]
        };
        HistogramSummary {
            count: self.count,
            sum: self.sum,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p50: percentile(0.50),
            p90: percentile(0.90),
            p99: percentile(0.99),
        }
    }
}

/// Holds every counter, gauge, and histogram the dispatch engine records,
/// keyed by name. Sampling (for threshold evaluation) reads the current
/// value without resetting it — counters only go up, gauges reflect the
/// latest `set`, histograms summarize their retained window.
#[derive(Default)]
pub struct MetricsRegistry {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, f64>>,
    histograms: Mutex<HashMap<String, Histogram>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments a named counter by `n`.
    pub fn increment_counter(&self, name: &str, n: u64) {
        *self.counters.lock().entry(name.to_string()).or_insert(0) += n;
        #[cfg(feature = "metrics")]
        metrics::counter!(name.to_string()).increment(n);
    }

    /// Sets a named gauge to `value`.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.gauges.lock().insert(name.to_string(), value);
        #[cfg(feature = "metrics")]
        metrics::gauge!(name.to_string()).set(value);
    }

    /// Records one observation into a named histogram.
    pub fn record_histogram(&self, name: &str, value: f64) {
        self.histograms
            .lock()
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .record(value);
        #[cfg(feature = "metrics")]
        metrics::histogram!(name.to_string()).record(value);
    }

    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.gauges.lock().get(name).copied()
    }

    pub fn histogram_summary(&self, name: &str) -> Option<HistogramSummary> {
        self.histograms.lock().get(name).map(Histogram::summary)
    }

    /// Snapshots every currently known metric as [`MetricPoint`]s, stamped
    /// with `now`.
    pub fn snapshot(&self, now: Instant) -> Vec<MetricPoint> {
        let mut points = Vec::new();
        for (name, value) in self.counters.lock().iter() {
            points.push(MetricPoint {
                name: name.clone(),
                metric_type: MetricType::Counter,
                value: *value as f64,
                timestamp: now,
                labels: HashMap::new(),
            });
        }
        for (name, value) in self.gauges.lock().iter() {
            points.push(MetricPoint {
                name: name.clone(),
                metric_type: MetricType::Gauge,
                value: *value,
                timestamp: now,
                labels: HashMap::new(),
            });
        }
        for (name, histogram) in self.histograms.lock().iter() {
            points.push(MetricPoint {
                name: name.clone(),
                metric_type: MetricType::Histogram,
                value: histogram.summary().mean(),
                timestamp: now,
                labels: HashMap::new(),
            });
        }
        points
    }
}
