//! Tracing setup: human-readable console output plus a daily log file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::ConfigError;

const LOG_FILE_PREFIX: &str = "print-quote";

/// Install the global subscriber. `RUST_LOG` controls the level (default
/// `info`). Keep the returned guard alive until exit or buffered file
/// output is lost.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard, ConfigError> {
    let (file_writer, guard) = file_writer(log_dir)?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}

fn file_writer(
    log_dir: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), ConfigError> {
    std::fs::create_dir_all(log_dir)?;

    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| ConfigError::InvalidValue {
            key: "PRINT_QUOTE_LOG_DIR".into(),
            message: e.to_string(),
        })?;

    Ok(tracing_appender::non_blocking(appender))
}
