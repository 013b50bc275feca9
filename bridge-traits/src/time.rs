//! Time and Logging Abstractions
//!
//! Provides an injectable monotonic time source and a logging sink for testing
//! and host integration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::{error::Result, platform::PlatformSendSync};

/// Monotonic time source.
///
/// Playback pacing measures elapsed real time between controller ticks. The
/// clock is injected so tests can advance time deterministically instead of
/// sleeping.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn elapsed_ms(clock: &dyn Clock, since: std::time::Instant) -> u128 {
///     clock.now().duration_since(since).as_millis()
/// }
/// ```
pub trait Clock: PlatformSendSync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// System clock implementation using the OS monotonic clock
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Target module/component
    pub target: String,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: HashMap<String, String>,
    /// Name of the innermost span the event was recorded in
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs from the engine to the host logging pipeline
/// (console, log file, system journal). Calls arrive on actor threads, so
/// implementations must not block for long.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::{LoggerSink, LogEntry, LogLevel};
///
/// fn log_error(logger: &dyn LoggerSink, error: &str) {
///     let entry = LogEntry::new(LogLevel::Error, "core_playback", error)
///         .with_field("actor", "frame-fetcher");
///     logger.log(entry).ok();
/// }
/// ```
pub trait LoggerSink: PlatformSendSync {
    /// Forward a log entry to the host logging system
    fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered logs
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Minimum level that will be processed.
    ///
    /// Entries below this level are filtered out before formatting.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Writes entries to stderr, one line each, tagged with the actor span.
///
/// ```text
/// 12:00:01.250 WARN  [playback-controller] core_playback::controller: Audio did not start in time waited_ms=2000
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    /// Render `entry` as a single line. Fields are sorted by name.
    pub fn format(entry: &LogEntry) -> String {
        let level = match entry.level {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO ",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR",
        };
        let mut line = format!("{} {}", entry.timestamp.format("%H:%M:%S%.3f"), level);
        if let Some(span) = &entry.span {
            line.push_str(&format!(" [{span}]"));
        }
        line.push_str(&format!(" {}: {}", entry.target, entry.message));

        let mut fields: Vec<_> = entry.fields.iter().collect();
        fields.sort();
        for (key, value) in fields {
            line.push_str(&format!(" {key}={value}"));
        }
        line
    }
}

impl LoggerSink for ConsoleLogger {
    fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            eprintln!("{}", Self::format(&entry));
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();

        assert!(second >= first);
    }

    #[test]
    fn test_log_entry_builder() {
        let entry = LogEntry::new(LogLevel::Info, "test", "Test message")
            .with_field("seq", "42")
            .with_span("frame-cache");

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.target, "test");
        assert_eq!(entry.message, "Test message");
        assert_eq!(entry.fields.get("seq"), Some(&"42".to_string()));
        assert_eq!(entry.span, Some("frame-cache".to_string()));
    }

    #[test]
    fn test_console_logger_line_format() {
        let entry = LogEntry::new(LogLevel::Warn, "core_playback::audio", "Sink failed")
            .with_field("seq", "12")
            .with_field("bytes", "640")
            .with_span("audio-renderer");

        let line = ConsoleLogger::format(&entry);
        assert!(line.ends_with(
            "WARN  [audio-renderer] core_playback::audio: Sink failed bytes=640 seq=12"
        ));

        let logger = ConsoleLogger::new(LogLevel::Error);
        assert!(logger.log(entry).is_ok());
        assert_eq!(logger.min_level(), LogLevel::Error);
    }
}
