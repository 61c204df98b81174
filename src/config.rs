//! `EngineConfig` (§6): the full configuration surface the core consumes.
//!
//! Parsing from a file is explicitly out of scope (§1) — this is an
//! already-materialized value the embedding application builds, either by
//! hand via [`EngineConfigBuilder`] or by `serde`-deserializing one from
//! whatever format the caller prefers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A serde-friendly mirror of [`dispatch_monitor::Comparator`] so
/// `EngineConfig` can be deserialized without that crate needing a serde
/// dependency of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdComparator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl From<ThresholdComparator> for dispatch_monitor::Comparator {
    fn from(value: ThresholdComparator) -> Self {
        match value {
            ThresholdComparator::GreaterThan => dispatch_monitor::Comparator::GreaterThan,
            ThresholdComparator::GreaterOrEqual => dispatch_monitor::Comparator::GreaterOrEqual,
            ThresholdComparator::LessThan => dispatch_monitor::Comparator::LessThan,
            ThresholdComparator::LessOrEqual => dispatch_monitor::Comparator::LessOrEqual,
        }
    }
}

/// A serde-friendly mirror of [`dispatch_monitor::Severity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<ThresholdSeverity> for dispatch_monitor::Severity {
    fn from(value: ThresholdSeverity) -> Self {
        match value {
            ThresholdSeverity::Low => dispatch_monitor::Severity::Low,
            ThresholdSeverity::Medium => dispatch_monitor::Severity::Medium,
            ThresholdSeverity::High => dispatch_monitor::Severity::High,
            ThresholdSeverity::Critical => dispatch_monitor::Severity::Critical,
        }
    }
}

/// One `monitor_thresholds` list entry (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSpec {
    pub metric_name: String,
    pub comparator: ThresholdComparator,
    pub value: f64,
    pub severity: ThresholdSeverity,
}

impl ThresholdSpec {
    pub fn into_threshold(self) -> dispatch_monitor::Threshold {
        dispatch_monitor::Threshold::new(self.metric_name, self.comparator.into(), self.value, self.severity.into())
    }
}

/// The full configuration surface the core consumes (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrent_requests: usize,
    pub max_queue_size: usize,
    pub queue_item_ttl_seconds: u64,
    pub dlq_max_size: usize,
    pub rate_limit_per_second: f64,
    pub retry_count: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: Option<u64>,
    pub cache_max_entries: usize,
    pub breaker_failure_threshold: u32,
    pub breaker_timeout_seconds: u64,
    pub breaker_half_open_max_calls: u32,
    pub breaker_probe_required: u32,
    pub queue_persist_path: Option<String>,
    pub monitor_collect_interval_ms: u64,
    pub monitor_thresholds: Vec<ThresholdSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 50,
            max_queue_size: 10_000,
            queue_item_ttl_seconds: 3600,
            dlq_max_size: 1000,
            rate_limit_per_second: 50.0,
            retry_count: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 60_000,
            cache_enabled: true,
            cache_ttl_seconds: None,
            cache_max_entries: 1000,
            breaker_failure_threshold: 5,
            breaker_timeout_seconds: 30,
            breaker_half_open_max_calls: 1,
            breaker_probe_required: 1,
            queue_persist_path: None,
            monitor_collect_interval_ms: 10_000,
            monitor_thresholds: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn queue_item_ttl(&self) -> Duration {
        Duration::from_secs(self.queue_item_ttl_seconds)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_seconds.map(Duration::from_secs)
    }

    pub fn breaker_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_timeout_seconds)
    }

    pub fn monitor_collect_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_collect_interval_ms)
    }
}

/// Builder for [`EngineConfig`], mirroring every `*ConfigBuilder` in the
/// component crates this engine composes.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn max_concurrent_requests(mut self, n: usize) -> Self {
        self.config.max_concurrent_requests = n;
        self
    }

    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.config.max_queue_size = n;
        self
    }

    pub fn queue_item_ttl(mut self, duration: Duration) -> Self {
        self.config.queue_item_ttl_seconds = duration.as_secs();
        self
    }

    pub fn dlq_max_size(mut self, n: usize) -> Self {
        self.config.dlq_max_size = n;
        self
    }

    pub fn rate_limit_per_second(mut self, rate: f64) -> Self {
        self.config.rate_limit_per_second = rate;
        self
    }

    pub fn retry_count(mut self, n: u32) -> Self {
        self.config.retry_count = n;
        self
    }

    pub fn retry_base_delay(mut self, duration: Duration) -> Self {
        self.config.retry_base_delay_ms = duration.as_millis() as u64;
        self
    }

    pub fn retry_max_delay(mut self, duration: Duration) -> Self {
        self.config.retry_max_delay_ms = duration.as_millis() as u64;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.config.cache_ttl_seconds = Some(duration.as_secs());
        self
    }

    pub fn cache_max_entries(mut self, n: usize) -> Self {
        self.config.cache_max_entries = n;
        self
    }

    pub fn breaker_failure_threshold(mut self, n: u32) -> Self {
        self.config.breaker_failure_threshold = n;
        self
    }

    pub fn breaker_timeout(mut self, duration: Duration) -> Self {
        self.config.breaker_timeout_seconds = duration.as_secs();
        self
    }

    pub fn breaker_half_open_max_calls(mut self, n: u32) -> Self {
        self.config.breaker_half_open_max_calls = n;
        self
    }

    pub fn breaker_probe_required(mut self, n: u32) -> Self {
        self.config.breaker_probe_required = n;
        self
    }

    pub fn queue_persist_path(mut self, path: impl Into<String>) -> Self {
        self.config.queue_persist_path = Some(path.into());
        self
    }

    pub fn monitor_collect_interval(mut self, duration: Duration) -> Self {
        self.config.monitor_collect_interval_ms = duration.as_millis() as u64;
        self
    }

    pub fn monitor_threshold(mut self, spec: ThresholdSpec) -> Self {
        self.config.monitor_thresholds.push(spec);
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_requests, 50);
        assert_eq!(config.retry_count, 3);
        assert!(config.cache_enabled);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::builder()
            .max_concurrent_requests(10)
            .rate_limit_per_second(5.0)
            .build();
        assert_eq!(config.max_concurrent_requests, 10);
        assert_eq!(config.rate_limit_per_second, 5.0);
    }

    #[test]
    fn deserializes_from_json_with_partial_overrides() {
        let json = r#"{"max_concurrent_requests": 5}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.retry_count, 3);
    }
}
