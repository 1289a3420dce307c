//! Tracing subscriber setup for the binary.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Daily files are named `lookout.log.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "lookout.log";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Daily-rolling files in this directory, for when the terminal UI owns
    /// the screen
    File(PathBuf),
}

/// Filter from a directive such as `info` or `lookout=debug,axum=warn`.
/// Invalid directives fall back to `info`.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Keep the returned guard alive for as long
/// as file logging should flush.
pub fn init(level: &str, target: LogTarget) -> Result<Option<WorkerGuard>> {
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter(level))
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init()
                .map_err(|e| Error::Other(format!("failed to initialise logging: {}", e)))?;
            Ok(None)
        }
        LogTarget::File(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter(level))
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| Error::Other(format!("failed to initialise logging: {}", e)))?;
            Ok(Some(guard))
        }
    }
}
