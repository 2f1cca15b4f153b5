//! Tracing subscriber setup for binaries embedding the report layer.

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "trajectory-report.log";

/// Initialize the tracing subscriber.
///
/// Use RUST_LOG to control the level (e.g. `RUST_LOG=trajectory_core=debug`).
/// With `log_dir` set, events are also written to a daily rolling file; keep
/// the returned guard alive until exit or buffered lines are lost.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr)
                .with(filter)
                .try_init()?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // The global subscriber can be installed once per process, so this is the
    // only test calling init_tracing.
    #[test]
    fn test_init_tracing_writes_to_log_dir() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init_tracing(Some(&log_dir)).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());

        tracing::error!("logging initialized");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with(LOG_FILE_PREFIX));

        // A second subscriber is refused rather than replacing the first
        assert!(init_tracing(None).is_err());
    }
}
