//! Daemon orchestration -- assembly, channel wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `logwarden-daemon`.
//! It turns a validated [`LogwardenConfig`] into a monitoring session and a
//! sink dispatcher connected by a bounded batch channel, then drives both
//! until a shutdown signal arrives.
//!
//! # Startup Order
//!
//! 1. PID file
//! 2. Monitoring session (rules loaded, one unit per watched file)
//! 3. Sink dispatcher (consumes batches)
//!
//! # Shutdown Order
//!
//! 1. Monitoring session (units flush their buffers and drop the batch sender)
//! 2. Sink dispatcher (drains the channel until it closes)
//! 3. PID file removal

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use logwarden_core::config::{ExportConfig, LogwardenConfig};
use logwarden_core::pipeline::{HealthStatus, Pipeline};
use logwarden_core::types::Batch;
use logwarden_log_pipeline::{
    CsvExportSink, DispatchSummary, JsonLinesSink, MonitorSession, MonitorSessionBuilder,
    PipelineConfig, SinkDispatcher, TracingSink,
};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::metrics_server;

/// Interval between periodic health log lines in the main loop.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogwardenConfig,
    /// Monitoring session (None when `[monitor]` is disabled).
    session: Option<MonitorSession>,
    /// Batch receiver handed to the dispatcher at startup.
    batch_rx: Option<mpsc::Receiver<Batch>>,
    /// Sink dispatcher, moved into its task at startup.
    dispatcher: Option<SinkDispatcher>,
    /// Names of the configured sinks, for health reporting.
    sink_names: Vec<String>,
    /// Running dispatcher task.
    dispatcher_task: Option<JoinHandle<DispatchSummary>>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// This performs the following steps:
    /// 1. Load `logwarden.toml` and apply environment variable overrides
    /// 2. Validate the configuration
    /// 3. Build the monitoring session and the sinks
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - The monitoring session cannot be built
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogwardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: LogwardenConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let (session, batch_rx) = if config.monitor.enabled {
            tracing::info!(
                watch_paths = config.monitor.watch_paths.len(),
                "initializing monitoring session"
            );
            let pipeline_config = PipelineConfig::from_core(&config.monitor)
                .map_err(|e| anyhow::anyhow!("invalid monitor config: {}", e))?;
            let (session, batch_rx) = MonitorSessionBuilder::new()
                .config(pipeline_config)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build monitoring session: {}", e))?;
            (Some(session), batch_rx)
        } else {
            tracing::info!("monitoring disabled");
            (None, None)
        };

        let dispatcher = build_sinks(&config.export);
        let sink_names = dispatcher
            .sink_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let (shutdown_tx, _) = broadcast::channel(16);

        record_daemon_metrics();
        tracing::info!(sinks = ?sink_names, "orchestrator initialized");

        Ok(Self {
            config,
            session,
            batch_rx,
            dispatcher: Some(dispatcher),
            sink_names,
            dispatcher_task: None,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the session and dispatcher and block until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the session and dispatcher and block until `shutdown` resolves.
    ///
    /// The future yields the name of the trigger, which is logged.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_path = (!self.config.general.pid_file.is_empty())
            .then(|| Path::new(&self.config.general.pid_file).to_path_buf());
        if let Some(path) = &pid_path {
            write_pid_file(path)?;
        }

        if let Some(session) = self.session.as_mut() {
            tracing::info!("starting monitoring session");
            if let Err(e) = session.start().await {
                tracing::error!(error = %e, "monitoring session failed to start");
                if let Some(path) = &pid_path {
                    remove_pid_file(path);
                }
                return Err(e.into());
            }
        }

        if let (Some(dispatcher), Some(rx)) = (self.dispatcher.take(), self.batch_rx.take()) {
            self.dispatcher_task = Some(tokio::spawn(dispatcher.run(rx)));
        }

        let mut uptime_updater_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("entering main event loop");
        let mut health_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + HEALTH_LOG_INTERVAL,
            HEALTH_LOG_INTERVAL,
        );
        tokio::pin!(shutdown);

        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal,
                _ = health_tick.tick() => {
                    let health = self.health().await;
                    tracing::info!(
                        status = %health.status,
                        uptime_secs = health.uptime_secs,
                        "daemon health"
                    );
                }
            }
        };

        let result = match signal {
            Ok(name) => {
                tracing::info!(signal = name, "shutdown signal received");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "shutdown trigger failed, shutting down");
                Err(e)
            }
        };

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_updater_task.take() {
            let _ = task.await;
        }

        self.shutdown().await?;

        if let Some(path) = &pid_path {
            remove_pid_file(path);
        }

        result
    }

    /// Stop the session, then wait for the dispatcher to drain the channel.
    async fn shutdown(&mut self) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            tracing::info!("stopping monitoring session");
            session.stop().await?;
        }

        if let Some(task) = self.dispatcher_task.take() {
            let summary = task
                .await
                .map_err(|e| anyhow::anyhow!("sink dispatcher task failed: {}", e))?;
            tracing::info!(
                batches = summary.batches,
                records = summary.records,
                failures = summary.failures,
                "sink dispatcher finished"
            );
        }

        Ok(())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let monitor = match &self.session {
            Some(session) => ComponentHealth::enabled("monitor", session.health_check().await),
            None => ComponentHealth::disabled("monitor"),
        };

        let sinks_status = match &self.dispatcher_task {
            Some(task) if task.is_finished() => {
                HealthStatus::Unhealthy("sink dispatcher exited".to_owned())
            }
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Unhealthy("not started".to_owned()),
        };
        let sinks = ComponentHealth {
            name: "sinks".to_owned(),
            enabled: self.session.is_some(),
            status: sinks_status,
        };

        let components = vec![monitor, sinks];
        let status = aggregate_status(&components);
        let uptime_secs = self.start_time.elapsed().as_secs();

        if self.config.metrics.enabled {
            use logwarden_core::metrics as m;
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status,
            uptime_secs,
            components,
        }
    }

    /// Names of the configured sinks.
    pub fn sink_names(&self) -> &[String] {
        &self.sink_names
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogwardenConfig {
        &self.config
    }
}

/// Build the sink dispatcher from the export configuration.
///
/// The tracing sink is always present; file sinks are added for non-empty paths.
fn build_sinks(export: &ExportConfig) -> SinkDispatcher {
    let mut dispatcher = SinkDispatcher::new().with_sink(Box::new(TracingSink));

    if !export.csv_path.is_empty() {
        dispatcher = dispatcher.with_sink(Box::new(CsvExportSink::new(&export.csv_path)));
    }
    if !export.jsonl_path.is_empty() {
        dispatcher = dispatcher.with_sink(Box::new(JsonLinesSink::new(&export.jsonl_path)));
    }

    dispatcher
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}

/// Write the current process PID to a file.
///
/// # Security
///
/// - `create_new(true)` refuses to overwrite an existing file
/// - The created file must be a regular file
/// - Parent directory is created with mode 0o700
///
/// # Errors
///
/// Returns an error if the PID file exists or cannot be written.
pub(crate) fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Logs a warning on failure.
pub(crate) fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record the build info gauge (always 1, with a version label).
fn record_daemon_metrics() {
    use logwarden_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that updates the uptime gauge every 10 seconds.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    use logwarden_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_write_pid_file_creates_parent_directory() {
        // Given: A path with non-existent parent directory
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("run").join("logwarden.pid");

        // When: Writing PID file
        write_pid_file(&pid_file).unwrap();

        // Then: File contains the current PID
        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_pid_file_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("logwarden.pid");
        write_pid_file(&pid_file).unwrap();

        let mode = fs::metadata(&pid_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_pid_file_fails_if_already_exists() {
        // Given: An existing PID file
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("logwarden.pid");
        fs::write(&pid_file, "12345").unwrap();

        // When: Attempting to write PID file again
        let err = write_pid_file(&pid_file).unwrap_err().to_string();

        // Then: Error names the existing PID and the file is untouched
        assert!(err.contains("already exists"), "got: {err}");
        assert!(err.contains("12345"), "got: {err}");
        assert_eq!(fs::read_to_string(&pid_file).unwrap(), "12345");
    }

    #[test]
    fn test_remove_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("logwarden.pid");
        fs::write(&pid_file, "99999").unwrap();

        remove_pid_file(&pid_file);
        assert!(!pid_file.exists());

        // Removing again only logs a warning
        remove_pid_file(&pid_file);
    }

    #[test]
    fn test_build_sinks_from_export_config() {
        let dispatcher = build_sinks(&ExportConfig::default());
        assert_eq!(dispatcher.sink_names(), vec!["tracing"]);

        let dispatcher = build_sinks(&ExportConfig {
            csv_path: "/tmp/out.csv".to_owned(),
            jsonl_path: "/tmp/out.jsonl".to_owned(),
        });
        assert_eq!(dispatcher.len(), 3);
    }

    #[tokio::test]
    async fn test_uptime_updater_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), shutdown_rx);

        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(Duration::from_millis(500), task).await;
        assert!(result.is_ok(), "uptime updater should stop within timeout");
    }
}
