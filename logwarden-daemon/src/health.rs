//! Aggregated health reporting.
//!
//! Combines the monitoring session and the sink dispatcher into a single
//! [`DaemonHealth`] report. The overall status is the worst status among
//! all enabled components.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use logwarden_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all components).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-component health reports.
    pub components: Vec<ComponentHealth>,
}

/// Health status for a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g., "monitor", "sinks").
    pub name: String,
    /// Whether the component is enabled in configuration.
    pub enabled: bool,
    /// Current health status of the component.
    pub status: HealthStatus,
}

impl ComponentHealth {
    /// Create a report for an enabled component.
    pub fn enabled(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            status,
        }
    }

    /// Create a report for a disabled component.
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            status: HealthStatus::Unhealthy("disabled".to_owned()),
        }
    }
}

/// Aggregate component health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Only considers enabled components.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let mut unhealthy = Vec::new();
    let mut degraded = Vec::new();

    for component in components.iter().filter(|c| c.enabled) {
        match &component.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                degraded.push(format!("{}: {}", component.name, reason));
            }
            HealthStatus::Unhealthy(reason) => {
                unhealthy.push(format!("{}: {}", component.name, reason));
            }
        }
    }

    if !unhealthy.is_empty() {
        HealthStatus::Unhealthy(unhealthy.join("; "))
    } else if !degraded.is_empty() {
        HealthStatus::Degraded(degraded.join("; "))
    } else {
        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_healthy() {
        let components = [
            ComponentHealth::enabled("monitor", HealthStatus::Healthy),
            ComponentHealth::enabled("sinks", HealthStatus::Healthy),
        ];
        assert_eq!(aggregate_status(&components), HealthStatus::Healthy);
    }

    #[test]
    fn degraded_wins_over_healthy() {
        let components = [
            ComponentHealth::enabled("monitor", HealthStatus::Degraded("1 of 3 units ended".to_owned())),
            ComponentHealth::enabled("sinks", HealthStatus::Healthy),
        ];
        assert_eq!(
            aggregate_status(&components),
            HealthStatus::Degraded("monitor: 1 of 3 units ended".to_owned())
        );
    }

    #[test]
    fn unhealthy_wins_and_lists_only_unhealthy_reasons() {
        let components = [
            ComponentHealth::enabled("monitor", HealthStatus::Degraded("slow".to_owned())),
            ComponentHealth::enabled("sinks", HealthStatus::Unhealthy("exited".to_owned())),
        ];
        assert_eq!(
            aggregate_status(&components),
            HealthStatus::Unhealthy("sinks: exited".to_owned())
        );
    }

    #[test]
    fn disabled_components_are_ignored() {
        let components = [
            ComponentHealth::disabled("monitor"),
            ComponentHealth::enabled("sinks", HealthStatus::Healthy),
        ];
        assert!(aggregate_status(&components).is_healthy());
    }

    #[test]
    fn report_serializes_status_tag() {
        let report = DaemonHealth {
            status: HealthStatus::Degraded("x".to_owned()),
            uptime_secs: 5,
            components: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"]["status"], "degraded");
        assert_eq!(json["status"]["reason"], "x");
        assert_eq!(json["uptime_secs"], 5);
    }
}
