use std::path::Path;

use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Name of the daily-rolled log file.
pub const LOG_FILE_NAME: &str = "snapdisk.log";

/// 128 random bits rendered as 32 lowercase hex characters.
pub fn unique_hex() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Install the global subscriber: human-readable output on stderr, plus a
/// plain-text file layer when a non-blocking file writer is given.
pub fn register_to_tracing(file: Option<NonBlocking>, env_filter: EnvFilter) {
    let file_layer = file.map(|non_blocking| {
        fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init();
}

/// Open a daily-rolling log file in `log_dir`.
///
/// The returned guard flushes pending lines on drop and must be held for as
/// long as logging should reach the file.
pub fn init_file_logging(log_dir: &Path) -> SnapdiskResult<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        SnapdiskError::Config(format!(
            "Failed to create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    Ok(tracing_appender::non_blocking(file_appender))
}
