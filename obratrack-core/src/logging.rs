//! Logging for the obratrack binaries
//!
//! Report and import runs append to a daily file under
//! `$XDG_STATE_HOME/obratrack/`, keeping the newest `max_files` files.
//! `RUST_LOG` overrides the configured level.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix; rotation appends the date.
const LOG_FILE_PREFIX: &str = "obratrack.log";

/// Install the global subscriber writing to the rolling log file.
///
/// Call once per process, before any report work.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("cannot open log file in {}: {}", log_dir.display(), e)))?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: worker })
}

/// Route engine logs to the test harness output.
///
/// Defaults to `debug` for this crate when `RUST_LOG` is unset; safe to call
/// from every test.
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("obratrack_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// Keeps the background log writer running; dropping it flushes the file.
#[must_use = "logs are lost once the guard is dropped"]
pub struct LoggingGuard {
    _worker: tracing_appender::non_blocking::WorkerGuard,
}
