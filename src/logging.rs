//! File-backed tracing setup.
//!
//! The TUI owns the terminal, so log lines go to `~/.gemchat/logs/gemchat.log`
//! through a non-blocking writer. `RUST_LOG` overrides the default filter.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Keeps the background log writer alive; dropping it flushes the file
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

pub fn init(log_dir: &Path) -> Result<LoggingGuard> {
    fs::create_dir_all(log_dir).context("Failed to create log directory")?;

    let log_path = log_dir.join("gemchat.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    let (writer, file_guard) = tracing_appender::non_blocking(file);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    tracing::info!(log_path = %log_path.display(), "Logging initialized");

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
