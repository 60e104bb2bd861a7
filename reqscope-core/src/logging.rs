//! Tracing setup for the reqscope binary
//!
//! Every command writes to a daily log under the XDG state directory
//! (`~/.local/state/reqscope/reqscope.log.YYYY-MM-DD`). `serve` also mirrors
//! events to stdout so a supervisor or container runtime can collect them.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

const LOG_FILE_PREFIX: &str = "reqscope.log";

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` wins over `logging.level` when set. Only one subscriber can be
/// installed per process; a second call returns [`Error::Logging`].
///
/// Keep the returned guard alive for as long as the process logs. Dropping it
/// flushes whatever the background writer still holds.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let (writer, guard) = file_writer(&log_dir, config.max_files)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stdout_layer = config.stdout.then(|| fmt::layer().with_writer(std::io::stdout));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| Error::Logging(format!("failed to install subscriber: {}", e)))?;

    tracing::info!(
        log_file = %log_file_path().display(),
        level = %config.level,
        stdout = config.stdout,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: guard })
}

// Rotated daily; the appender prunes anything past `max_files`
fn file_writer(log_dir: &Path, max_files: usize) -> Result<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Logging(format!("failed to create log appender: {}", e)))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Route tracing output through the test harness's captured stdout.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes the background log writer on drop.
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Base path of the log files. The appender adds a `.YYYY-MM-DD` suffix.
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
