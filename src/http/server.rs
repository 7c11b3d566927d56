//! HTTP server setup and connection draining.
//!
//! # Responsibilities
//! - Accept connections through the bounded listener
//! - Serve each connection with hyper (HTTP/1.1 and HTTP/2) into the axum app
//! - Apply the keep-alive timeout to new connections
//! - On drain: stop accepting, let in-flight requests finish within the
//!   grace period, abort whatever is still open afterwards

use axum::{extract::Request, Router};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto::Builder, graceful::GracefulShutdown},
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tower::ServiceExt;

use crate::config::Settings;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;

/// Errors raised while serving or draining.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server is already draining")]
    AlreadyDraining,

    #[error("serving task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Per-server connection options.
#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    pub keep_alive_timeout: Duration,
    pub max_connections: usize,
}

impl From<&Settings> for ServeOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            keep_alive_timeout: settings.keep_alive_timeout(),
            max_connections: settings.max_connections,
        }
    }
}

/// Outcome of draining a running application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// True when the grace period elapsed with connections still open.
    pub forced: bool,
    /// Connections aborted at the deadline.
    pub aborted_connections: u64,
    pub elapsed: Duration,
}

/// HTTP server wrapping the request-handling application.
pub struct HttpServer {
    router: Router,
    options: ServeOptions,
}

impl HttpServer {
    pub fn new(router: Router, options: ServeOptions) -> Self {
        Self { router, options }
    }

    /// Bind `addr` and start serving.
    pub async fn bind(self, addr: SocketAddr) -> Result<RunningApplication, ServeError> {
        let listener = Listener::bind(addr, self.options.max_connections).await?;
        self.start(listener)
    }

    /// Start serving on an already bound listener.
    pub fn serve(self, listener: TcpListener) -> Result<RunningApplication, ServeError> {
        let listener = Listener::from_tcp(listener, self.options.max_connections)?;
        self.start(listener)
    }

    fn start(self, listener: Listener) -> Result<RunningApplication, ServeError> {
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let (drain_tx, drain_rx) = oneshot::channel();
        let (keep_alive_tx, keep_alive_rx) = watch::channel(self.options.keep_alive_timeout);
        let tracker = ConnectionTracker::new();

        let task = tokio::spawn(accept_loop(
            listener,
            self.router,
            keep_alive_rx,
            drain_rx,
            tracker.clone(),
        ));

        tracing::info!(address = %local_addr, "HTTP server starting");

        Ok(RunningApplication {
            local_addr,
            keep_alive: keep_alive_tx,
            drain: Some(drain_tx),
            task: Some(task),
            tracker,
        })
    }
}

/// Handle to a listening server.
pub struct RunningApplication {
    local_addr: SocketAddr,
    keep_alive: watch::Sender<Duration>,
    drain: Option<oneshot::Sender<Duration>>,
    task: Option<JoinHandle<DrainReport>>,
    tracker: ConnectionTracker,
}

impl RunningApplication {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Applies to connections accepted after the call.
    pub fn set_keep_alive_timeout(&self, timeout: Duration) {
        self.keep_alive.send_replace(timeout);
        tracing::debug!(keep_alive_ms = timeout.as_millis() as u64, "Keep-alive timeout set");
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        *self.keep_alive.borrow()
    }

    pub fn open_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting and wait for open connections, up to `grace`.
    ///
    /// Connections still open when `grace` elapses are closed forcibly.
    pub async fn drain(&mut self, grace: Duration) -> Result<DrainReport, ServeError> {
        let (drain, task) = match (self.drain.take(), self.task.take()) {
            (Some(drain), Some(task)) => (drain, task),
            _ => return Err(ServeError::AlreadyDraining),
        };
        // The accept loop owns the receiver; it only goes away if the task died.
        let _ = drain.send(grace);
        Ok(task.await?)
    }
}

impl Drop for RunningApplication {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: Listener,
    router: Router,
    keep_alive: watch::Receiver<Duration>,
    mut drain: oneshot::Receiver<Duration>,
    tracker: ConnectionTracker,
) -> DrainReport {
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    let grace = loop {
        tokio::select! {
            requested = &mut drain => break requested.unwrap_or(Duration::ZERO),
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    metrics::record_connection_accepted();
                    let guard = tracker.track();
                    let router = router.clone();
                    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
                        router.clone().oneshot(request)
                    });
                    let builder = connection_builder(*keep_alive.borrow());
                    let connection = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .into_owned();
                    let watched = graceful.watch(connection);

                    connections.spawn(async move {
                        let _permit = permit;
                        if let Err(e) = watched.await {
                            tracing::debug!(
                                peer_addr = %peer,
                                connection_id = %guard.id(),
                                error = %e,
                                "Connection ended with error"
                            );
                        }
                        drop(guard);
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    };

    drop(listener);
    let started = Instant::now();
    tracing::info!(
        open_connections = tracker.active_count(),
        grace_ms = grace.as_millis() as u64,
        "Stopped accepting connections, draining"
    );

    let drained = tokio::time::timeout(grace, graceful.shutdown()).await.is_ok();
    let aborted_connections = if drained { 0 } else { tracker.active_count() };

    connections.abort_all();
    while connections.join_next().await.is_some() {}

    if !drained {
        tracing::warn!(
            aborted_connections,
            "Shutdown timeout elapsed, closing remaining connections"
        );
        metrics::record_forced_drain(aborted_connections as usize);
    }

    DrainReport {
        forced: !drained,
        aborted_connections,
        elapsed: started.elapsed(),
    }
}

fn connection_builder(keep_alive: Duration) -> Builder<TokioExecutor> {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .keep_alive(true)
        .timer(TokioTimer::new())
        .header_read_timeout(keep_alive);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    async fn start(router: Router) -> RunningApplication {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        HttpServer::new(
            router,
            ServeOptions {
                keep_alive_timeout: Duration::from_secs(5),
                max_connections: 16,
            },
        )
        .serve(listener)
        .unwrap()
    }

    #[tokio::test]
    async fn idle_server_drains_immediately() {
        let mut app = start(Router::new().route("/", get(|| async { "ok" }))).await;
        let report = app.drain(Duration::from_secs(5)).await.unwrap();
        assert!(!report.forced);
        assert_eq!(report.aborted_connections, 0);
        assert!(report.elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn drain_twice_is_rejected() {
        let mut app = start(Router::new()).await;
        app.drain(Duration::ZERO).await.unwrap();
        assert!(matches!(
            app.drain(Duration::ZERO).await,
            Err(ServeError::AlreadyDraining)
        ));
    }

    #[tokio::test]
    async fn keep_alive_timeout_is_adjustable() {
        let app = start(Router::new()).await;
        assert_eq!(app.keep_alive_timeout(), Duration::from_secs(5));
        app.set_keep_alive_timeout(Duration::from_millis(90_000));
        assert_eq!(app.keep_alive_timeout(), Duration::from_millis(90_000));
    }
}
