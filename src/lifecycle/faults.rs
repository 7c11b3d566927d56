//! Process-wide fault routing.
//!
//! Two kinds of unobserved failure reach this module:
//! - a detached task that finished with `Err` (an unhandled rejection),
//!   which is logged and never terminates the process;
//! - a panic (an uncaught exception), which terminates the process with
//!   exit code 1 unless its message marks a transient infrastructure fault
//!   such as a dropped pooled database connection.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::PanicHookInfo;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Message raised when a pooled database connection drops.
pub const TRANSIENT_CONNECTION_MESSAGE: &str = "Connection terminated unexpectedly";

/// Exit code used for fatal faults.
pub const FATAL_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Expected to resolve on its own; the process keeps running.
    TransientInfra,
    Fatal,
}

impl FaultKind {
    pub fn classify(message: &str) -> Self {
        if message.contains(TRANSIENT_CONNECTION_MESSAGE) {
            FaultKind::TransientInfra
        } else {
            FaultKind::Fatal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::TransientInfra => "transient_infra",
            FaultKind::Fatal => "fatal",
        }
    }
}

/// What happened to the process after a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Exit(i32),
}

/// Terminates the process. Injected so fault routing can be tested.
pub trait ProcessExit: Send + Sync {
    fn exit(&self, code: i32);
}

/// Exits through `std::process::exit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdProcessExit;

impl ProcessExit for StdProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

#[derive(Clone)]
pub struct FaultHandler {
    exit: Arc<dyn ProcessExit>,
}

impl FaultHandler {
    pub fn new(exit: Arc<dyn ProcessExit>) -> Self {
        Self { exit }
    }

    /// A detached task failed and nobody awaited its result.
    pub fn on_unhandled_rejection(&self, task: &str, error: &dyn Display) {
        metrics::record_fault("unhandled_rejection");
        tracing::error!(task, error = %error, "Unhandled task failure");
    }

    /// A panic escaped; exits the process unless the fault is transient.
    pub fn on_uncaught(&self, message: &str) -> Disposition {
        let kind = FaultKind::classify(message);
        metrics::record_fault(kind.as_str());

        match kind {
            FaultKind::TransientInfra => {
                tracing::error!(
                    error = message,
                    "Uncaught exception thrown (transient infrastructure fault, continuing)"
                );
                Disposition::Continue
            }
            FaultKind::Fatal => {
                tracing::error!(error = message, "Uncaught exception thrown");
                self.exit.exit(FATAL_EXIT_CODE);
                Disposition::Exit(FATAL_EXIT_CODE)
            }
        }
    }

    /// Route panics through [`FaultHandler::on_uncaught`] until the guard drops.
    ///
    /// The hook that was installed before is restored when the guard drops.
    pub fn install(&self) -> PanicHookGuard {
        let handler = self.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = panic_message(info.payload());
            let message = match info.location() {
                Some(location) => format!("{message} (at {location})"),
                None => message,
            };
            handler.on_uncaught(&message);
        }));
        PanicHookGuard {
            previous: Some(previous),
        }
    }

    /// Spawn a task whose `Err` result is reported as an unhandled rejection.
    pub fn spawn_detached<F, E>(&self, task: &'static str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let handler = self.clone();
        tokio::spawn(async move {
            if let Err(error) = future.await {
                handler.on_unhandled_rejection(task, &error);
            }
        })
    }
}

impl Default for FaultHandler {
    fn default() -> Self {
        Self::new(Arc::new(StdProcessExit))
    }
}

/// Text of a panic payload, for `panic!` with a literal or a formatted message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_string())
}

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Puts the previous panic hook back when dropped.
#[must_use = "dropping the guard uninstalls the panic hook"]
pub struct PanicHookGuard {
    previous: Option<PanicHook>,
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            std::panic::set_hook(previous);
        }
    }
}
