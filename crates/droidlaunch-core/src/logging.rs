//! Logging configuration using tracing

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

const LOG_FILENAME: &str = "droidlaunch.log";

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/droidlaunch/logs/` (platform data dir).
/// Log level is controlled by the `DROIDLAUNCH_LOG` environment variable.
///
/// # Examples
/// ```bash
/// DROIDLAUNCH_LOG=debug droidlaunch devices
/// DROIDLAUNCH_LOG=droidlaunch_daemon=trace droidlaunch mirror emulator-5554
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILENAME);

    let env_filter = EnvFilter::try_from_env("DROIDLAUNCH_LOG")
        .unwrap_or_else(|_| EnvFilter::new("droidlaunch=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("droidlaunch starting");
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> Result<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(base.join("droidlaunch").join("logs"))
}

/// Get the log file path for the current day
pub fn get_current_log_file() -> Result<PathBuf> {
    let dir = get_log_directory()?;
    Ok(dated_log_file(&dir))
}

/// Daily rotation appends the UTC date to the file name
fn dated_log_file(dir: &Path) -> PathBuf {
    dir.join(format!("{}.{}", LOG_FILENAME, Utc::now().format("%Y-%m-%d")))
}
