//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Keep a reload handle so the configured level can be applied after
//!   settings are loaded
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Initial filter comes from `RUST_LOG`; the settings' `logLevel` replaces it

use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::{Environment, LogLevel};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "medplum_server=info,tower_http=info";

/// Errors raised by the logging subsystem.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to install global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to reload log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle to the process logger owned by the supervisor.
///
/// A detached handle accepts level changes but has no subscriber behind it;
/// tests construct supervisors with one so no global state is touched.
#[derive(Clone)]
pub struct LogHandle {
    filter: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogHandle {
    /// Install the global subscriber and return its handle.
    pub fn init(environment: Environment) -> Result<Self, LoggingError> {
        let initial = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let (filter, handle) = reload::Layer::new(initial);

        let registry = tracing_subscriber::registry().with(filter);
        if environment.is_production() {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()?;
        }

        Ok(Self {
            filter: Some(handle),
        })
    }

    pub fn detached() -> Self {
        Self { filter: None }
    }

    /// Replace the active filter with the given level.
    pub fn set_level(&self, level: LogLevel) -> Result<(), LoggingError> {
        if let Some(handle) = &self.filter {
            handle.reload(EnvFilter::new(level.as_directive()))?;
        }
        tracing::info!(level = %level, "Log level applied");
        Ok(())
    }

    pub fn is_detached(&self) -> bool {
        self.filter.is_none()
    }
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle")
            .field("detached", &self.is_detached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_handle_accepts_levels() {
        let handle = LogHandle::detached();
        assert!(handle.is_detached());
        assert!(handle.set_level(LogLevel::Debug).is_ok());
    }
}
