//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing in production
//! - The log level is owned by a handle, not module-level state
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::LogHandle;
