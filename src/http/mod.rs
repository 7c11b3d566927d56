//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, keep-alive, graceful drain)
//!     → request.rs (request ID set/propagate)
//!     → app.rs (application router built by the factory)
//!     → Send to client
//! ```

pub mod app;
pub mod request;
pub mod server;

pub use app::{AppError, ApplicationFactory, DefaultApplication};
pub use request::X_REQUEST_ID;
pub use server::{DrainReport, HttpServer, RunningApplication, ServeError, ServeOptions};
