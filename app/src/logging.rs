//! FILENAME: app/src/logging.rs
// PURPOSE: Unified logging backend for the host and the core crates.
// CONTEXT: The core crates log through the `log` facade with a category as
// target ("PIVOT", "FORMULA", "CATALOG"). This backend numbers every line and
// writes it to stderr and, once initialized, to the log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

use crate::error::AppError;

// ============================================================================
// UNIFIED LOGGING SYSTEM
// ============================================================================

/// Global sequence counter, one number per written line
static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Global log file handle
pub static LOG_FILE: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

static LOGGER: SequencedLogger = SequencedLogger;

/// Get next sequence number
pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst) + 1
}

/// Formats one log line: `[seq] LEVEL CATEGORY message`.
pub fn format_line(seq: u64, level: Level, category: &str, message: &str) -> String {
    format!("[{}] {:<5} {} {}", seq, level, category, message)
}

/// Opens (truncating) the log file every subsequent line is appended to.
pub fn init_log_file(path: &Path) -> Result<(), AppError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|source| AppError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let mut log_file = LOG_FILE
        .lock()
        .map_err(|e| AppError::Command(format!("Lock error: {}", e)))?;
    *log_file = Some(file);
    Ok(())
}

/// Write a log line in unified format
pub fn write_log(level: Level, category: &str, message: &str) {
    let line = format_line(next_seq(), level, category, message);

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            if let Err(e) = writeln!(file, "{}", line) {
                eprintln!("[LOG_ERROR] Failed to write: {}", e);
            }
            let _ = file.flush();
        }
    }

    eprintln!("{}", line);
}

/// Installs the backend as the global logger.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<(), AppError> {
    if let Some(path) = file {
        init_log_file(path)?;
    }
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

struct SequencedLogger;

impl Log for SequencedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            write_log(record.level(), record.target(), &record.args().to_string());
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = LOG_FILE.lock() {
            if let Some(ref mut file) = *guard {
                let _ = file.flush();
            }
        }
    }
}

// ============================================================================
// MACROS
// ============================================================================

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        log::debug!(target: $cat, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        log::info!(target: $cat, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        log::warn!(target: $cat, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line(7, Level::Warn, "PIVOT", "skipped record 3"),
            "[7] WARN  PIVOT skipped record 3"
        );
        assert_eq!(
            format_line(12, Level::Debug, "FORMULA", "ok"),
            "[12] DEBUG FORMULA ok"
        );
    }

    #[test]
    fn test_second_init_reports_installed_logger() {
        let _ = init(LevelFilter::Off, None);
        let err = init(LevelFilter::Off, None).unwrap_err();
        assert!(matches!(err, AppError::Logger(_)));
        assert_eq!(err.to_string(), "logger already installed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_sequence_is_increasing() {
        let first = next_seq();
        let second = next_seq();
        assert!(second > first);
    }
}
