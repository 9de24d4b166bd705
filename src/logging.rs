use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_LEVEL;
use crate::error::{AppError, Result};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "FM_LOG";

/// Build the filter: `FM_LOG` wins, then `level`, then the default level.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber, appending to `log_file`.
///
/// The terminal belongs to the UI, so without a file nothing is installed
/// and diagnostics are discarded.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let Some(log_file) = log_file else {
        return Ok(());
    };

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    tracing::info!(path = %log_file.display(), "logging initialized");
    Ok(())
}
