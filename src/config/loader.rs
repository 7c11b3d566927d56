//! Configuration loading.
//!
//! A configuration is named `scheme:identifier`. Only the `file` scheme is
//! resolved here; `.toml` files are parsed as TOML, everything else as JSON.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::Settings;
use crate::config::validation::{validate_settings, ValidationError};

/// Environment variable selecting the configuration source.
pub const CONFIG_NAME_VAR: &str = "CONFIG_NAME";

/// Configuration used when `CONFIG_NAME` is not set.
pub const DEFAULT_CONFIG_NAME: &str = "file:medplum.config.json";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config name '{0}': expected scheme:identifier")]
    InvalidName(String),

    #[error("unsupported config scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A parsed `scheme:identifier` configuration reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigName {
    pub scheme: String,
    pub identifier: String,
}

/// Raw value of `CONFIG_NAME`, or the default when unset or blank.
pub fn config_name_from_env() -> String {
    match std::env::var(CONFIG_NAME_VAR) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => DEFAULT_CONFIG_NAME.to_string(),
    }
}

impl FromStr for ConfigName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, identifier) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidName(s.to_string()))?;
        if scheme.is_empty() || identifier.is_empty() {
            return Err(ConfigError::InvalidName(s.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            identifier: identifier.to_string(),
        })
    }
}

impl fmt::Display for ConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.identifier)
    }
}

/// Resolves a configuration name into validated settings.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self, name: &ConfigName) -> Result<Settings, ConfigError>;
}

/// Reads settings from the local filesystem (`file:` scheme).
#[derive(Debug, Clone, Default)]
pub struct FileConfigSource {
    base_dir: Option<PathBuf>,
}

impl FileConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative identifiers against `dir` instead of the cwd.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn resolve(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self, name: &ConfigName) -> Result<Settings, ConfigError> {
        if name.scheme != "file" {
            return Err(ConfigError::UnsupportedScheme(name.scheme.clone()));
        }

        let path = self.resolve(&name.identifier);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

        let settings = parse_settings(&path, &content)?;
        tracing::debug!(path = %path.display(), "Configuration file parsed");
        Ok(settings)
    }
}

/// Parse and validate settings, picking the format from the file extension.
pub fn parse_settings(path: &Path, content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(content)?,
        _ => serde_json::from_str(content)?,
    };

    validate_settings(&settings).map_err(ConfigError::Validation)?;

    Ok(settings)
}
