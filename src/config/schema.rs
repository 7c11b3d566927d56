//! Configuration schema definitions.
//!
//! The server configuration document carries many more keys than the
//! lifecycle core consumes; unknown keys are ignored on deserialization.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default keep-alive timeout for idle HTTP/1 connections.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT_MS: u64 = 90_000;

/// Grace period used when the document does not set a shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

/// Settings consumed by the process supervisor.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// TCP port the application listens on.
    pub port: u16,

    /// Idle timeout for kept-alive connections, in milliseconds.
    #[serde(default = "default_keep_alive_timeout_ms", alias = "keepAliveTimeout")]
    pub keep_alive_timeout_ms: u64,

    /// Upper bound for the whole shutdown sequence, in milliseconds.
    ///
    /// A value that is not a non-negative integer is treated as unset.
    #[serde(
        default,
        alias = "shutdownTimeoutMilliseconds",
        deserialize_with = "lenient_timeout_ms"
    )]
    pub shutdown_timeout_ms: Option<u64>,

    /// Log level applied to the global logger once settings are loaded.
    #[serde(default)]
    pub log_level: Option<LogLevel>,

    /// Maximum number of concurrently open client connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_keep_alive_timeout_ms() -> u64 {
    DEFAULT_KEEP_ALIVE_TIMEOUT_MS
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimeout {
    Millis(u64),
    Malformed(serde::de::IgnoredAny),
}

fn lenient_timeout_ms<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimeout>::deserialize(deserializer)? {
        Some(RawTimeout::Millis(ms)) => Ok(Some(ms)),
        Some(RawTimeout::Malformed(_)) => {
            tracing::warn!("shutdownTimeoutMs is not a non-negative integer, ignoring it");
            Ok(None)
        }
        None => Ok(None),
    }
}

fn default_max_connections() -> usize {
    10_000
}

impl Settings {
    /// Settings for the given port with every optional field defaulted.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            keep_alive_timeout_ms: DEFAULT_KEEP_ALIVE_TIMEOUT_MS,
            shutdown_timeout_ms: None,
            log_level: None,
            max_connections: default_max_connections(),
        }
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }

    /// Shutdown grace period, falling back to the default when unset.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(
            self.shutdown_timeout_ms
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        )
    }
}

/// Log verbosity accepted in the configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Error returned for an unrecognized log level string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid log level: {0}")]
pub struct ParseLogLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ParseLogLevelError;

    fn try_from(value: String) -> Result<Self, ParseLogLevelError> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_directive().to_string()
    }
}

/// Deployment environment, selected by the `APP_ENV` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub const VAR: &'static str = "APP_ENV";

    /// Read the environment flag; anything but `production` is development.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(Self::VAR).ok().as_deref())
    }

    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let settings: Settings = serde_json::from_str(r#"{"port": 8103}"#).unwrap();
        assert_eq!(settings.port, 8103);
        assert_eq!(settings.keep_alive_timeout_ms, 90_000);
        assert_eq!(settings.shutdown_timeout_ms, None);
        assert_eq!(settings.shutdown_timeout(), Duration::from_millis(30_000));
        assert_eq!(settings.log_level, None);
    }

    #[test]
    fn legacy_keys_are_accepted() {
        let settings: Settings = serde_json::from_str(
            r#"{"port": 8103, "keepAliveTimeout": 5000, "shutdownTimeoutMilliseconds": 250, "logLevel": "DEBUG", "baseUrl": "http://localhost:8103/"}"#,
        )
        .unwrap();
        assert_eq!(settings.keep_alive_timeout_ms, 5000);
        assert_eq!(settings.shutdown_timeout_ms, Some(250));
        assert_eq!(settings.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!("NONE".parse::<LogLevel>(), Ok(LogLevel::Off));
        assert_eq!(" warn ".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn malformed_shutdown_timeout_falls_back_to_default() {
        for raw in [r#""5000""#, "-1", "2.5", "true", "null"] {
            let settings: Settings =
                serde_json::from_str(&format!(r#"{{"port": 8103, "shutdownTimeoutMs": {raw}}}"#))
                    .unwrap();
            assert_eq!(settings.shutdown_timeout_ms, None, "value {raw}");
            assert_eq!(settings.shutdown_timeout(), Duration::from_millis(30_000));
        }

        let settings: Settings =
            toml::from_str("port = 8103\nshutdownTimeoutMs = \"soon\"\n").unwrap();
        assert_eq!(settings.shutdown_timeout_ms, None);
    }

    #[test]
    fn zero_shutdown_timeout_is_kept() {
        let settings: Settings =
            serde_json::from_str(r#"{"port": 8103, "shutdownTimeoutMs": 0}"#).unwrap();
        assert_eq!(settings.shutdown_timeout_ms, Some(0));
        assert_eq!(settings.shutdown_timeout(), Duration::ZERO);
    }

    #[test]
    fn log_level_round_trips_through_try_from() {
        assert_eq!(LogLevel::try_from("Trace".to_string()), Ok(LogLevel::Trace));
        assert_eq!(String::from(LogLevel::Off), "off");
    }

    #[test]
    fn environment_flag() {
        assert_eq!(Environment::from_value(Some("production")), Environment::Production);
        assert_eq!(Environment::from_value(Some("staging")), Environment::Development);
        assert_eq!(Environment::from_value(None), Environment::Development);
    }
}
