//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CONFIG_NAME (scheme:identifier)
//!     → loader.rs (resolve source, parse JSON/TOML)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → owned by the supervisor for the process lifetime
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; there is no hot reload
//! - Optional fields have defaults to allow minimal documents
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{config_name_from_env, ConfigError, ConfigName, ConfigSource, FileConfigSource};
pub use schema::{Environment, LogLevel, Settings};
