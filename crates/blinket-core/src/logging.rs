//! Tracing subscriber setup for applications embedding the sync core.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, paths};

const LOG_FILE_PREFIX: &str = "blinket.log";

/// Installs the global subscriber: stderr output, plus a daily-rolling file
/// under `${BLINKET_HOME}/logs` when `logging.file` is enabled.
///
/// Keep the returned guard alive for the lifetime of the app; dropping it
/// flushes and stops the file writer.
///
/// # Errors
/// Returns an error if the filter is invalid, the log directory cannot be
/// created, or a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    init_with_dir(config, &paths::logs_dir())
}

/// Same as [`init`] with an explicit log directory.
///
/// # Errors
/// See [`init`].
pub fn init_with_dir(config: &LoggingConfig, dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(&config.level)?;
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if !config.file {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(None);
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Some(guard))
}

/// RUST_LOG wins over the configured level.
fn build_filter(default_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level)
        .with_context(|| format!("Invalid logging level: {default_level}"))
}
