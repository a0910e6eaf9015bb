use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use super::config::{AppConfig, LOG_FILE_NAME};

/// Log to `~/.muxplay/muxplay.log`. Nothing goes to the terminal: the
/// status line owns it. Keep the guard alive until exit so lines get flushed.
pub fn init(config: &AppConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(config.dir(), LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")?;

    Ok(guard)
}
