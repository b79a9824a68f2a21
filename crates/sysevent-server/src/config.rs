//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use sysevent_db::DbRuntimeSettings;
use sysevent_log::{LogSettings, DEFAULT_CAPACITY, DEFAULT_FLUSH_INTERVAL};
use sysevent_types::{LogLevel, ALL_RECORD_TABLES};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Queue and flush settings shared by every system log.
    #[serde(default)]
    pub system_logs: SystemLogsConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "sysevent_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Least severe level copied into `text_log` (e.g. "info", "Warning").
    #[serde(default = "default_text_log_level")]
    pub text_log_level: String,
}

/// System log queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemLogsConfig {
    /// Maximum buffered records per log before new ones are dropped.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Period of the worker's opportunistic flush.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Buffered count that triggers a flush on its own; 0 means half capacity.
    #[serde(default)]
    pub flush_threshold: usize,

    /// Table names of logs that are not constructed at all.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8123
}

fn default_db_path() -> String {
    "sysevent.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    DbRuntimeSettings::default().pool_max_size
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_text_log_level() -> String {
    "info".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL.as_millis() as u64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            text_log_level: default_text_log_level(),
        }
    }
}

impl Default for SystemLogsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            flush_interval_ms: default_flush_interval_ms(),
            flush_threshold: 0,
            disabled: Vec::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

impl LoggingConfig {
    /// Parsed `text_log_level`, falling back to `Information` when the value
    /// is not a known level.
    pub fn text_log_level(&self) -> LogLevel {
        self.text_log_level.parse().unwrap_or_else(|_| {
            tracing::warn!(
                value = %self.text_log_level,
                "unknown text_log_level, using Information"
            );
            LogLevel::Information
        })
    }
}

impl SystemLogsConfig {
    /// The core-facing, validated view of this section.
    pub fn to_log_settings(&self) -> LogSettings {
        LogSettings::new(self.capacity, Duration::from_millis(self.flush_interval_ms))
            .with_flush_threshold(self.flush_threshold)
    }

    /// Entries of `disabled` that name no known log.
    pub fn unknown_disabled(&self) -> Vec<&str> {
        self.disabled
            .iter()
            .map(String::as_str)
            .filter(|table| !ALL_RECORD_TABLES.contains(table))
            .collect()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SYSEVENT_HOST` overrides `server.host`
/// - `SYSEVENT_PORT` overrides `server.port`
/// - `SYSEVENT_DB_PATH` overrides `database.path`
/// - `SYSEVENT_LOG_LEVEL` overrides `logging.level`
/// - `SYSEVENT_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `SYSEVENT_QUEUE_CAPACITY` overrides `system_logs.capacity`
/// - `SYSEVENT_FLUSH_INTERVAL_MS` overrides `system_logs.flush_interval_ms`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("SYSEVENT_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("SYSEVENT_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("SYSEVENT_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("SYSEVENT_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("SYSEVENT_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(capacity) = std::env::var("SYSEVENT_QUEUE_CAPACITY") {
        if let Ok(parsed) = capacity.parse() {
            config.system_logs.capacity = parsed;
        }
    }
    if let Ok(interval) = std::env::var("SYSEVENT_FLUSH_INTERVAL_MS") {
        if let Ok(parsed) = interval.parse() {
            config.system_logs.flush_interval_ms = parsed;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.database.path, "sysevent.db");
        assert_eq!(config.system_logs.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.system_logs.flush_interval_ms, 7_500);

        let settings = config.system_logs.to_log_settings();
        assert_eq!(settings.flush_threshold(), DEFAULT_CAPACITY / 2);
    }

    #[test]
    fn parses_system_logs_section() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            text_log_level = "warn"

            [system_logs]
            capacity = 100
            flush_interval_ms = 250
            flush_threshold = 10
            disabled = ["trace_log", "bogus_log"]
            "#,
        )
        .unwrap();

        let settings = config.system_logs.to_log_settings();
        assert_eq!(settings.capacity(), 100);
        assert_eq!(settings.flush_interval(), Duration::from_millis(250));
        assert_eq!(settings.flush_threshold(), 10);
        assert_eq!(config.system_logs.unknown_disabled(), vec!["bogus_log"]);
        assert_eq!(config.logging.text_log_level(), LogLevel::Warning);
    }

    #[test]
    fn invalid_text_log_level_falls_back_to_information() {
        let logging = LoggingConfig {
            text_log_level: "loud".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(logging.text_log_level(), LogLevel::Information);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config(path.to_str()),
            Err(ConfigError::Parse(_))
        ));
    }
}
