//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> build -> start -> batches reach sinks -> shutdown.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use logwarden_core::config::LogwardenConfig;
use logwarden_core::pipeline::HealthStatus;
use logwarden_daemon::orchestrator::Orchestrator;
use tokio::time::{sleep, timeout};

const RULES: &str = r#"
- name: ssh-root-login-failure
  pattern: 'Failed password for root'
  severity: CRITICAL
"#;

fn append(path: &Path, lines: &[&str]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

/// Config watching a single auth log inside `dir`, exporting CSV and JSON Lines.
fn monitor_config(dir: &Path) -> LogwardenConfig {
    let auth = dir.join("auth.log");
    let rules = dir.join("rules.yaml");
    std::fs::write(&rules, RULES).unwrap();

    let toml_str = format!(
        r#"
[general]
log_level = "info"
pid_file = "{pid}"

[monitor]
enabled = true
watch_paths = ["{auth}"]
rules_path = "{rules}"
batch_size = 100
flush_interval_ms = 20
poll_interval_ms = 10

[[monitor.sources]]
path = "{auth}"
format = "auth"

[export]
csv_path = "{csv}"
jsonl_path = "{jsonl}"

[metrics]
enabled = false
"#,
        pid = dir.join("logwarden.pid").display(),
        auth = auth.display(),
        rules = rules.display(),
        csv = dir.join("out.csv").display(),
        jsonl = dir.join("out.jsonl").display(),
    );
    LogwardenConfig::parse(&toml_str).expect("failed to parse test config")
}

fn minimal_test_config() -> LogwardenConfig {
    let toml_str = r#"
[general]
pid_file = ""

[monitor]
enabled = false
"#;
    LogwardenConfig::parse(toml_str).expect("failed to parse minimal config")
}

async fn wait_for_lines(path: &Path, count: usize) {
    let _ = timeout(Duration::from_secs(5), async {
        loop {
            let lines = std::fs::read_to_string(path)
                .map(|c| c.lines().count())
                .unwrap_or(0);
            if lines >= count {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn test_build_with_monitor_disabled() {
    // Given: A config with monitoring disabled
    let config = minimal_test_config();

    // When: Building the orchestrator
    let orchestrator = Orchestrator::build_from_config(config).await.unwrap();

    // Then: Only the tracing sink is configured and monitor is not reported
    assert_eq!(orchestrator.sink_names(), ["tracing".to_owned()]);
    let health = orchestrator.health().await;
    assert!(health.status.is_healthy());
    assert!(health.components.iter().all(|c| !c.enabled));
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let mut config = minimal_test_config();
    config.general.log_level = "verbose".to_owned();

    let result = Orchestrator::build_from_config(config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_build_from_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = Orchestrator::build(&dir.path().join("missing.toml")).await;

    let err = result.err().unwrap().to_string();
    assert!(err.contains("failed to load config"), "got: {err}");
}

#[tokio::test]
async fn test_health_before_run_is_unhealthy() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::build_from_config(monitor_config(dir.path()))
        .await
        .unwrap();

    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
    assert_eq!(orchestrator.sink_names(), ["tracing", "csv", "jsonl"]);
}

#[tokio::test]
async fn test_run_until_exports_records_and_cleans_up() {
    // Given: An auth log with two lines and a running orchestrator
    let dir = tempfile::tempdir().unwrap();
    let config = monitor_config(dir.path());
    append(
        &dir.path().join("auth.log"),
        &[
            "2024-01-15T12:00:00.1+00:00 host sshd[1]: Failed password for root",
            "2024-01-15T12:00:01.1+00:00 host sshd[1]: Accepted publickey for alice",
        ],
    );
    let csv_path = dir.path().join("out.csv");
    let jsonl_path = dir.path().join("out.jsonl");
    let pid_path = dir.path().join("logwarden.pid");

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();

    // When: Shutdown is triggered once the CSV export holds both records
    let trigger = {
        let csv_path = csv_path.clone();
        let pid_path = pid_path.clone();
        async move {
            wait_for_lines(&csv_path, 3).await;
            assert!(pid_path.exists(), "PID file should exist while running");
            Ok("test")
        }
    };
    orchestrator.run_until(trigger).await.unwrap();

    // Then: Both sinks received the records and the PID file is gone
    let content = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 3, "got: {content}");
    assert_eq!(lines[0], "Timestamp,Level,Source,Message,LogFile");
    assert!(lines[1].contains("CRITICAL"));
    assert!(lines[2].contains(",INFO,"));

    let jsonl = std::fs::read_to_string(&jsonl_path).unwrap();
    assert_eq!(jsonl.lines().count(), 2);
    let first: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
    assert_eq!(first["level"], "CRITICAL");

    assert!(!pid_path.exists(), "PID file should be removed on shutdown");
    assert!(orchestrator.health().await.status.is_unhealthy());
}

#[tokio::test]
async fn test_run_fails_when_pid_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let config = monitor_config(dir.path());
    let pid_path = dir.path().join("logwarden.pid");
    std::fs::write(&pid_path, "4242").unwrap();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let err = orchestrator
        .run_until(async { Ok("test") })
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("4242"), "got: {err}");
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), "4242");
}

#[tokio::test]
async fn test_run_fails_on_bad_rules_and_removes_pid_file() {
    // Given: A rules file that does not compile
    let dir = tempfile::tempdir().unwrap();
    let config = monitor_config(dir.path());
    std::fs::write(
        dir.path().join("rules.yaml"),
        "- name: broken\n  pattern: '(unclosed'\n  severity: HIGH\n",
    )
    .unwrap();

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();

    // When: Running
    let result = orchestrator.run_until(async { Ok("test") }).await;

    // Then: Startup fails and leaves no PID file behind
    assert!(result.is_err());
    assert!(!dir.path().join("logwarden.pid").exists());
}

#[tokio::test]
async fn test_shutdown_trigger_error_is_returned_after_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let config = monitor_config(dir.path());
    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();

    let result = orchestrator
        .run_until(async { Err(anyhow::anyhow!("signal handler unavailable")) })
        .await;

    assert!(result.is_err());
    assert!(!dir.path().join("logwarden.pid").exists());
    assert!(matches!(
        orchestrator.health().await.status,
        HealthStatus::Unhealthy(_)
    ));
}
