//! Miku bot - Main entry point.

use anyhow::Result;
use miku_common::config::{Config, ConfigSource};
use miku_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration, environment wins over the file
    let (config, source) = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Starting Miku bot v{}", env!("CARGO_PKG_VERSION"));

    match &source {
        ConfigSource::File(path) => {
            tracing::info!(path = %path.display(), "Loaded config file");
        }
        ConfigSource::Defaults(path) => {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
        }
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    miku_channels::run(&config).await
}
