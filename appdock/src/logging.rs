//! Structured logging for the host.
//!
//! Writes compact single-line records to a session log file (cleared at
//! startup) and mirrors them to stdout, filtered through `RUST_LOG` with
//! an `info` default.

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive.
///
/// Dropping the guard flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initializes the global subscriber with file and stdout output.
///
/// Creates `log_dir` if missing and truncates any previous session's log
/// file. Must be called at most once per process.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the log file
/// cannot be truncated.
pub fn init_logging(log_dir: &str, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;

    // One log file per session; truncate whatever the last run left.
    let log_path = Path::new(log_dir).join(log_file);
    fs::write(&log_path, "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .compact();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // init_logging itself installs a process-global subscriber and can run
    // at most once, so the tests cover the file preparation it performs.

    #[test]
    fn session_file_is_truncated() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("appdock.log");
        fs::write(&log_path, "old session data").unwrap();

        fs::write(&log_path, "").unwrap();
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
    }

    #[test]
    fn nested_log_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deep/logs");

        fs::create_dir_all(&nested).unwrap();
        let log_path = nested.join("appdock.log");
        fs::write(&log_path, "").unwrap();
        assert!(log_path.exists());
    }

    #[test]
    fn guard_holds_worker() {
        let (writer, guard) = tracing_appender::non_blocking(std::io::sink());
        drop(writer);
        let _logging_guard = LoggingGuard { _file_guard: guard };
    }
}
