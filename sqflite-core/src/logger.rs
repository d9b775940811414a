//! Forwarding of the bridge's `log` output to a host-provided logger.

use std::sync::{Arc, OnceLock};

/// Trait representing a logger that can log messages at various levels.
///
/// Hosts implement this to receive the bridge's log output in their own
/// logging system (browser console, plugin log channel, ...).
///
/// # Examples
///
/// ```rust
/// use sqflite_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Very low priority, often extremely detailed messages.
    Trace,
    /// Lower priority debugging information.
    Debug,
    /// Progress of the bridge (readiness).
    Info,
    /// Potentially harmful situations, such as statements disposed on reopen.
    Warn,
    /// Failures.
    Error,
}

/// Forwards `log` records to the host-provided [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let is_record_from_sqflite = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("sqflite"));

        let is_debug_or_trace_level =
            record.level() == log::Level::Debug || record.level() == log::Level::Trace;

        // Debug and trace output of dependencies is noise for the host.
        if is_debug_or_trace_level && !is_record_from_sqflite {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), record.args().to_string());
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Installs a `log` backend that forwards every record to `logger`. Only the
/// first call has an effect; later calls print a notice and keep the first
/// logger.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
