//! Server text log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a text log message, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Fatal,
    Critical,
    Error,
    Warning,
    Notice,
    Information,
    Debug,
    Trace,
}

impl LogLevel {
    /// Returns the canonical label for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fatal => "Fatal",
            Self::Critical => "Critical",
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Notice => "Notice",
            Self::Information => "Information",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ParseLogLevelError;

    /// Accepts both the canonical labels and the short tracing-style names
    /// (`error`, `warn`, `info`, `debug`, `trace`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "notice" => Ok(Self::Notice),
            "information" | "info" => Ok(Self::Information),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown log level string.
#[derive(Debug, Clone)]
pub struct ParseLogLevelError(pub String);

impl std::fmt::Display for ParseLogLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown log level: {}", self.0)
    }
}

impl std::error::Error for ParseLogLevelError {}

/// One server log message (`text_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLog {
    pub event_time: DateTime<Utc>,
    pub thread_name: String,
    pub level: LogLevel,
    pub query_id: String,
    pub logger_name: String,
    pub message: String,
    pub source_file: Option<String>,
    pub source_line: Option<u32>,
}

crate::log_record!(TextLog, "TextLog", "text_log");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_canonical_names() {
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Information".parse::<LogLevel>().unwrap(), LogLevel::Information);
        assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Information < LogLevel::Trace);
    }
}
