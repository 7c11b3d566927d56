//! Shutdown coordination.
//!
//! # State Machine
//! ```text
//! Running ──signal──▶ ShutdownRequested ──pre-shutdown──▶ Draining
//!     ──drain + on-shutdown──▶ Finalized   (finally hook runs last)
//! ```
//!
//! One deadline, the shutdown timeout, bounds the pre-shutdown hook, the
//! drain and the on-shutdown hook together. There is no way back to
//! `Running` once a signal has been received.

use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::Environment;
use crate::http::server::{DrainReport, RunningApplication};
use crate::lifecycle::faults::panic_message;
use crate::lifecycle::signals::TerminationSignal;

/// Trigger shared by everything that may start a shutdown.
///
/// Only the first trigger counts; later ones are ignored.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<TerminationSignal>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns false if a shutdown was already requested.
    pub fn trigger(&self, signal: TerminationSignal) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(signal);
                true
            } else {
                false
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until a shutdown is requested.
    pub async fn requested(&self) -> TerminationSignal {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(signal) = *rx.borrow_and_update() {
                return signal;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return TerminationSignal::Requested;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShutdownRequested,
    Draining,
    Finalized,
}

pub type HookError = Box<dyn std::error::Error + Send + Sync>;
pub type HookResult = Result<(), HookError>;

type Hook = Box<dyn FnOnce(TerminationSignal) -> BoxFuture<'static, HookResult> + Send>;
type FinallyHook = Box<dyn FnOnce(&ShutdownReport) + Send>;

/// What the shutdown sequence did.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub signal: TerminationSignal,
    pub drain: Option<DrainReport>,
    /// True if any stage ran into the deadline.
    pub timed_out: bool,
    pub hook_errors: Vec<String>,
    pub elapsed: Duration,
}

/// Runs the shutdown sequence against a running application.
pub struct ShutdownCoordinator {
    timeout: Duration,
    environment: Environment,
    pre_shutdown: Option<Hook>,
    on_shutdown: Option<Hook>,
    finally: Option<FinallyHook>,
    state: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration, environment: Environment) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            timeout,
            environment,
            pre_shutdown: None,
            on_shutdown: None,
            finally: None,
            state,
        }
    }

    /// Runs once the signal arrives, before draining starts.
    pub fn pre_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(TerminationSignal) -> Fut + Send + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.pre_shutdown = Some(boxed_hook(hook));
        self
    }

    /// Runs after draining; releases external resources.
    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(TerminationSignal) -> Fut + Send + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.on_shutdown = Some(boxed_hook(hook));
        self
    }

    /// Always runs last, whatever happened before.
    pub fn finally<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&ShutdownReport) + Send + 'static,
    {
        self.finally = Some(Box::new(hook));
        self
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Wait for `shutdown`, then take `app` down.
    pub async fn run(mut self, shutdown: &Shutdown, app: &mut RunningApplication) -> ShutdownReport {
        let signal = shutdown.requested().await;
        let started = Instant::now();
        let deadline = started + self.timeout;
        self.state.send_replace(ShutdownState::ShutdownRequested);

        let mut report = ShutdownReport {
            signal,
            drain: None,
            timed_out: false,
            hook_errors: Vec::new(),
            elapsed: Duration::ZERO,
        };

        if let Some(hook) = self.pre_shutdown.take() {
            run_hook("pre-shutdown", hook(signal), deadline, &mut report).await;
        }

        self.state.send_replace(ShutdownState::Draining);
        let grace = if self.environment.is_production() {
            deadline.saturating_duration_since(Instant::now())
        } else {
            Duration::ZERO
        };
        match app.drain(grace).await {
            Ok(drain) => {
                report.timed_out |= drain.forced;
                report.drain = Some(drain);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to drain connections");
                report.hook_errors.push(e.to_string());
            }
        }

        if let Some(hook) = self.on_shutdown.take() {
            run_hook("on-shutdown", hook(signal), deadline, &mut report).await;
        }

        report.elapsed = started.elapsed();
        if let Some(hook) = self.finally.take() {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| hook(&report))) {
                tracing::error!(
                    error = %panic_message(payload.as_ref()),
                    "Finally hook panicked"
                );
            }
        }
        self.state.send_replace(ShutdownState::Finalized);
        report
    }
}

fn boxed_hook<F, Fut>(hook: F) -> Hook
where
    F: FnOnce(TerminationSignal) -> Fut + Send + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Box::new(move |signal| -> BoxFuture<'static, HookResult> { Box::pin(hook(signal)) })
}

async fn run_hook(
    name: &'static str,
    hook: BoxFuture<'static, HookResult>,
    deadline: Instant,
    report: &mut ShutdownReport,
) {
    // A panicking hook must not skip the rest of the sequence.
    let guarded = AssertUnwindSafe(hook).catch_unwind();
    match tokio::time::timeout_at(deadline, guarded).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => {
            tracing::warn!(hook = name, error = %e, "Shutdown hook failed");
            report.hook_errors.push(format!("{name}: {e}"));
        }
        Ok(Err(payload)) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(hook = name, error = %message, "Shutdown hook panicked");
            report.hook_errors.push(format!("{name}: panicked: {message}"));
        }
        Err(_) => {
            tracing::warn!(hook = name, "Shutdown hook exceeded the shutdown timeout");
            report.timed_out = true;
        }
    }
}
