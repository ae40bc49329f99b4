// SPDX-License-Identifier: Apache-2.0

//! Logging setup
//!
//! Library code only emits `tracing` events; applications call
//! [`init_tracing`] once to decide where they go.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

pub use polysql_core::Sensitive;

use crate::config::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "polysql.log";

/// Installs the global subscriber described by `config`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let writer = match &config.directory {
        Some(dir) => {
            if let Err(e) = fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {}", dir.display(), e);
                BoxMakeWriter::new(io::stderr)
            } else {
                if let Err(e) = cleanup_old_logs(dir, config.retention_days) {
                    eprintln!("Failed to clean up old logs: {}", e);
                }
                BoxMakeWriter::new(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
            }
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let env_filter = EnvFilter::try_new(config.effective_filter())
        .unwrap_or_else(|_| EnvFilter::new("polysql=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(config.directory.is_none() && !config.json)
        .with_span_events(FmtSpan::CLOSE);

    let installed = if config.json {
        builder
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        install_panic_hook();
        tracing::info!(directory = ?config.directory, "Tracing initialized");
    }
    installed
}

fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("PANIC: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("PANIC: {}", s)
        } else {
            "PANIC: unknown cause".to_string()
        };

        tracing::error!(target: "panic", location = %location, message = %msg, "Application panicked");
        previous_hook(panic_info);
    }));
}

/// Deletes rolled log files in `log_dir` older than `retention_days`.
///
/// Returns the number of files removed.
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<usize> {
    let now = SystemTime::now();
    let retention = Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60));
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_log {
            continue;
        }

        let age = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > retention) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to remove old log file {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}
