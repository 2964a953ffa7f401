//! logwarden-daemon entry point.
//!
//! Parses the command line, loads and validates `logwarden.toml`, initializes
//! tracing and hands control to the [`Orchestrator`].

use anyhow::Result;
use clap::Parser;

use logwarden_core::config::LogwardenConfig;
use logwarden_daemon::cli::DaemonCli;
use logwarden_daemon::logging::init_tracing;
use logwarden_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LogwardenConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "logwarden-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("logwarden-daemon stopped");
    Ok(())
}
