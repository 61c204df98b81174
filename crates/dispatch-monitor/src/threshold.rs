//! User-registered alert thresholds (§4.8).

use crate::alert::Severity;

/// How a sampled metric value compares against a threshold's `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparator {
    pub(crate) fn crossed(self, sample: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => sample > threshold,
            Comparator::GreaterOrEqual => sample >= threshold,
            Comparator::LessThan => sample < threshold,
            Comparator::LessOrEqual => sample <= threshold,
        }
    }
}

/// A `(metric, comparator, value, severity)` tuple registered with a
/// [`crate::Monitor`]. Thresholds are evaluated against the metric's
/// current sampled value on every `collect_interval` tick.
#[derive(Debug, Clone)]
pub struct Threshold {
    pub metric_name: String,
    pub comparator: Comparator,
    pub value: f64,
    pub severity: Severity,
}

impl Threshold {
    pub fn new(metric_name: impl Into<String>, comparator: Comparator, value: f64, severity: Severity) -> Self {
        Self {
            metric_name: metric_name.into(),
            comparator,
            value,
            severity,
        }
    }

    pub(crate) fn is_crossed(&self, sample: f64) -> bool {
        self.comparator.crossed(sample, self.value)
    }
}
