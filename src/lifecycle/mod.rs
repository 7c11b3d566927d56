//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Install fault hooks → Load settings → Apply log level
//!     → Build app → Bind → Register shutdown coordinator
//!
//! Faults (faults.rs):
//!     Failed detached task → log
//!     Panic → transient? log : exit(1)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → pre-shutdown hook → Stop accepting
//!     → Drain connections (bounded) → on-shutdown hook → finally
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then app, then listener
//! - Shutdown has one deadline: forced close after it

pub mod faults;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use faults::{Disposition, FaultHandler, FaultKind, ProcessExit, StdProcessExit};
pub use shutdown::{
    HookError, HookResult, Shutdown, ShutdownCoordinator, ShutdownReport, ShutdownState,
};
pub use signals::{SignalSubscription, TerminationListener, TerminationSignal};
pub use startup::{StartupError, Supervisor, SupervisorExit};
