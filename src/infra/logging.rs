use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_FILE_NAME: &str = "tsm.log";
const LOG_FILTER_ENV: &str = "TSM_LOG";

#[derive(Debug, Error)]
pub enum InitLoggingError {
    #[error("failed to open log file: {0}")]
    Open(#[from] io::Error),

    #[error("failed to install log subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Routes `tracing` output to `<log_dir>/tsm.log`; the terminal belongs to
/// the UI. The returned guard flushes the writer on drop and must outlive
/// the program's last log call.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, InitLoggingError> {
    fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;
    Ok(guard)
}
