//! Structured logging for the assessment engine
//!
//! Console output is compact and human-oriented; the rolling file output is JSON.
//! Logs are written to `<config dir>/netcert/logs/`.

pub mod macros;

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "netcert.log";

/// Initialize the logging system
///
/// Creates the log directory and sets up a daily rotating log file next to stderr output.
/// The level defaults to INFO; set `RUST_LOG` (e.g. `RUST_LOG=netcert_core=debug`) to change it.
///
/// Installing a second global subscriber (tests, embedding hosts) is not an error.
pub fn init_logging() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .json();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = init_result {
        if e.to_string().contains("already been set") {
            return Ok(log_dir);
        }
        return Err(Box::new(e));
    }

    tracing::info!("Logging initialized. Log directory: {}", log_dir.display());

    Ok(log_dir)
}

/// Log directory: `%LOCALAPPDATA%/netcert/logs` on Windows, `~/.config/netcert/logs` elsewhere.
/// `NETCERT_LOG_DIR` overrides both.
fn get_log_directory() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(dir) = crate::config::env_var("NETCERT_LOG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let base_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or("Could not find local data directory")?
            .join("netcert")
    } else {
        dirs::config_dir()
            .ok_or("Could not find config directory")?
            .join("netcert")
    };

    Ok(base_dir.join("logs"))
}

/// Path of today's log file
pub fn get_current_log_file() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("{}.{}", LOG_FILE_PREFIX, today)))
}
