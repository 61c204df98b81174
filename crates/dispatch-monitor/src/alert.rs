//! Alerts produced when a registered threshold is crossed (§3, §4.8).

use std::time::Instant;

/// Alert severity, used both to render/route alerts and to derive
/// [`dispatch_core::HealthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Whether an alert is currently crossing its threshold or has recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Firing,
    Resolved,
}

/// One alert instance, tracking a single threshold's crossing/recovery.
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: u64,
    pub severity: Severity,
    pub metric_name: String,
    pub observed_value: f64,
    pub threshold_value: f64,
    pub timestamp: Instant,
    pub status: AlertStatus,
}
