//! Logging setup for the `hotelprep` binary.
//!
//! Logs go to the console and to two daily-rolling files in the platform data
//! directory (or a directory given in the config):
//!
//! - `hotelprep.<date>.log`: everything that passes the `RUST_LOG` filter
//! - `error.<date>.log`: warnings and errors only
//!
//! ```no_run
//! hotelprep::logging::init(None).expect("Failed to initialize logging");
//! tracing::info!("Pipeline started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const LOG_PREFIX: &str = "hotelprep";
const MAX_LOG_FILES: usize = 10;

/// Resolve and create the log directory.
///
/// Without an override this is `<data dir>/hotelprep/logs`, e.g.
/// `~/.local/share/hotelprep/logs` on Linux.
pub fn get_log_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    let log_dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_dir()
            .context("Failed to determine data directory")?
            .join(LOG_PREFIX)
            .join("logs"),
    };

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

fn rolling_appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

/// Install the global subscriber. Level defaults to `info`; `RUST_LOG`
/// overrides it.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or an appender fails
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let log_dir = get_log_dir(log_dir)?;

    let all_logs_appender = rolling_appender(&log_dir, LOG_PREFIX)?;
    let error_logs_appender = rolling_appender(&log_dir, "error")?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .pretty();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(log_dir = %log_dir.display(), "Logging initialized");
    Ok(())
}
