//! Tracing subscriber setup.
//!
//! Logs go to stderr by default because stdout carries the stdio protocol
//! stream. With `GOOGLE_LOG_FILE` set they are appended to that file through a
//! non-blocking writer instead.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;

/// Keeps the background log writer alive. Dropping it flushes pending lines.
#[allow(dead_code)]
pub struct LogGuard(WorkerGuard);

/// Picks the filter directive: `--verbose`, then `RUST_LOG`, then the
/// configured level.
pub fn filter_directive(settings: &LogSettings, rust_log: Option<&str>, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directive) => directive.to_string(),
        None => settings.level.clone(),
    }
}

/// Installs the global subscriber.
///
/// Calling it twice is harmless; the second subscriber is dropped.
pub fn init(settings: &LogSettings, verbose: bool) -> Result<LogGuard> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(settings, rust_log.as_deref(), verbose);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter: {}", directive))?;

    let (writer, guard) = match &settings.file {
        Some(path) => open_file_writer(path)?,
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(settings.file.is_none())
        .with_target(true)
        .with_writer(writer)
        .try_init()
        .ok();

    if let Some(path) = &settings.file {
        tracing::debug!(log_file = %path.display(), "writing logs to file");
    }

    Ok(LogGuard(guard))
}

fn open_file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    Ok(tracing_appender::non_blocking(file))
}
