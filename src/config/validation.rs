//! Settings validation.
//!
//! Serde handles the syntactic checks; this module covers value ranges.
//! Every problem is reported, not just the first one.

use crate::config::schema::Settings;

/// A single semantic problem found in the settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.port == 0 {
        errors.push(ValidationError::new("port", "must be a positive integer"));
    }
    if settings.keep_alive_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "keepAliveTimeoutMs",
            "must be greater than zero",
        ));
    }
    if settings.max_connections == 0 {
        errors.push(ValidationError::new(
            "maxConnections",
            "must allow at least one connection",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
