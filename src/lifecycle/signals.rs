//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT/SIGTERM
//! - Translate them into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Subscriptions are owned values; dropping one unregisters it, so
//!   several supervisors can coexist in one test process

use std::fmt;
use tokio::task::JoinHandle;

use crate::lifecycle::faults::FaultHandler;
use crate::lifecycle::shutdown::Shutdown;

/// What asked the process to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
    /// Triggered from code rather than by the OS.
    Requested,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Requested => "requested",
        })
    }
}

/// Interrupt and terminate handlers, registered with the OS on construction.
///
/// Once constructed, a signal no longer takes the default disposition, even
/// if it arrives before [`TerminationListener::recv`] is polled.
pub struct TerminationListener {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationListener {
    pub fn new() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next interrupt or terminate signal.
    pub async fn recv(&mut self) -> std::io::Result<TerminationSignal> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => Ok(TerminationSignal::Interrupt),
                _ = self.terminate.recv() => Ok(TerminationSignal::Terminate),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            Ok(TerminationSignal::Interrupt)
        }
    }
}

/// A registered signal listener feeding a [`Shutdown`] trigger.
#[derive(Debug)]
pub struct SignalSubscription {
    task: JoinHandle<()>,
}

impl SignalSubscription {
    /// Listen for termination signals and forward the first one to `shutdown`.
    pub fn register(shutdown: &Shutdown, faults: &FaultHandler) -> Self {
        let shutdown = shutdown.clone();
        let listener = TerminationListener::new();
        let task = faults.spawn_detached("signal-listener", async move {
            let signal = listener?.recv().await?;
            tracing::info!(signal = %signal, "Termination signal received");
            shutdown.trigger(signal);
            Ok::<_, std::io::Error>(())
        });
        Self { task }
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
