use crate::alert::{Alert, Severity};
use dispatch_core::DispatchEvent;
use std::time::Instant;

/// The `alert_firing`/`alert_resolved` members of §6's event stream.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    AlertFiring {
        monitor_name: String,
        timestamp: Instant,
        metric_name: String,
        severity: Severity,
        observed_value: f64,
    },
    AlertResolved {
        monitor_name: String,
        timestamp: Instant,
        metric_name: String,
        severity: Severity,
    },
}

impl MonitorEvent {
    pub(crate) fn from_alert(monitor_name: &str, alert: &Alert, firing: bool) -> Self {
        if firing {
            MonitorEvent::AlertFiring {
                monitor_name: monitor_name.to_string(),
                timestamp: alert.timestamp,
                metric_name: alert.metric_name.clone(),
                severity: alert.severity,
                observed_value: alert.observed_value,
            }
        } else {
            MonitorEvent::AlertResolved {
                monitor_name: monitor_name.to_string(),
                timestamp: alert.timestamp,
                metric_name: alert.metric_name.clone(),
                severity: alert.severity,
            }
        }
    }
}

impl DispatchEvent for MonitorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::AlertFiring { .. } => "alert_firing",
            MonitorEvent::AlertResolved { .. } => "alert_resolved",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            MonitorEvent::AlertFiring { timestamp, .. } | MonitorEvent::AlertResolved { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            MonitorEvent::AlertFiring { monitor_name, .. } | MonitorEvent::AlertResolved { monitor_name, .. } => {
                monitor_name
            }
        }
    }
}
