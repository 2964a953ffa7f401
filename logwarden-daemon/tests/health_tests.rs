//! Health aggregation tests.

use logwarden_core::pipeline::HealthStatus;
use logwarden_daemon::health::{ComponentHealth, DaemonHealth, aggregate_status};

#[test]
fn test_aggregate_status_empty_is_healthy() {
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_aggregate_status_multiple_degraded_reasons_are_joined() {
    // Given: Two degraded components
    let components = vec![
        ComponentHealth::enabled("monitor", HealthStatus::Degraded("1 of 3 units ended".to_owned())),
        ComponentHealth::enabled("sinks", HealthStatus::Degraded("csv failing".to_owned())),
    ];

    // When: Aggregating status
    let status = aggregate_status(&components);

    // Then: Both reasons appear in order
    assert_eq!(
        status,
        HealthStatus::Degraded("monitor: 1 of 3 units ended; sinks: csv failing".to_owned())
    );
}

#[test]
fn test_aggregate_status_disabled_unhealthy_component_is_ignored() {
    let components = vec![
        ComponentHealth {
            name: "monitor".to_owned(),
            enabled: false,
            status: HealthStatus::Unhealthy("stopped".to_owned()),
        },
        ComponentHealth::enabled("sinks", HealthStatus::Degraded("slow".to_owned())),
    ];

    let status = aggregate_status(&components);
    assert_eq!(status, HealthStatus::Degraded("sinks: slow".to_owned()));
}

#[test]
fn test_disabled_component_constructor() {
    let component = ComponentHealth::disabled("monitor");
    assert!(!component.enabled);
    assert!(component.status.is_unhealthy());
}

#[test]
fn test_daemon_health_json_shape() {
    let health = DaemonHealth {
        status: HealthStatus::Healthy,
        uptime_secs: 42,
        components: vec![ComponentHealth::enabled("monitor", HealthStatus::Healthy)],
    };

    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["status"]["status"], "healthy");
    assert_eq!(json["uptime_secs"], 42);
    assert_eq!(json["components"][0]["name"], "monitor");
    assert_eq!(json["components"][0]["enabled"], true);
}
