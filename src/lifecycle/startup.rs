//! Startup orchestration.
//!
//! # Responsibilities
//! - Install process fault hooks before any async work
//! - Load settings and apply the configured log level
//! - Build the application, bind the port, apply the keep-alive timeout
//! - Register the shutdown coordinator and serve until it finalizes
//!
//! # Design Decisions
//! - A startup error is logged and reported, never turned into an exit;
//!   the binary decides to stay up without serving
//! - The supervisor is an explicit instance: logger, config source,
//!   application factory and signal subscription are all owned here

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::{ConfigError, ConfigName, ConfigSource, Environment, Settings};
use crate::http::app::{AppError, ApplicationFactory};
use crate::http::server::{HttpServer, RunningApplication, ServeError, ServeOptions};
use crate::lifecycle::faults::FaultHandler;
use crate::lifecycle::shutdown::{
    HookError, Shutdown, ShutdownCoordinator, ShutdownReport, ShutdownState,
};
use crate::lifecycle::signals::SignalSubscription;
use crate::observability::logging::{LogHandle, LoggingError};

/// Anything that stops the server from coming up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Application(#[from] AppError),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

/// How a supervisor run ended.
#[derive(Debug)]
pub enum SupervisorExit {
    /// The server ran and shut down through the coordinator.
    Completed(ShutdownReport),
    /// Startup failed; nothing is listening.
    StartupFailed(StartupError),
}

/// Top-level process orchestrator.
pub struct Supervisor {
    config_name: String,
    config_source: Arc<dyn ConfigSource>,
    factory: Arc<dyn ApplicationFactory>,
    environment: Environment,
    log: LogHandle,
    faults: FaultHandler,
    shutdown: Shutdown,
    host: IpAddr,
    process_hooks: bool,
    os_signals: bool,
    state: watch::Sender<ShutdownState>,
}

impl Supervisor {
    pub fn new(
        config_name: impl Into<String>,
        config_source: Arc<dyn ConfigSource>,
        factory: Arc<dyn ApplicationFactory>,
    ) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            config_name: config_name.into(),
            config_source,
            factory,
            environment: Environment::Development,
            log: LogHandle::detached(),
            faults: FaultHandler::default(),
            shutdown: Shutdown::new(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            process_hooks: true,
            os_signals: true,
            state,
        }
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn log_handle(mut self, log: LogHandle) -> Self {
        self.log = log;
        self
    }

    pub fn fault_handler(mut self, faults: FaultHandler) -> Self {
        self.faults = faults;
        self
    }

    /// Address to bind instead of all interfaces.
    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Leave the process panic hook alone.
    pub fn without_process_hooks(mut self) -> Self {
        self.process_hooks = false;
        self
    }

    /// Do not listen for OS signals; shut down through [`Supervisor::shutdown_handle`].
    pub fn without_os_signals(mut self) -> Self {
        self.os_signals = false;
        self
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Shutdown state of the served application.
    pub fn state(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Start the server and serve until the shutdown sequence finalizes.
    pub async fn run(self) -> SupervisorExit {
        let _panic_hook = self.process_hooks.then(|| self.faults.install());

        tracing::info!(config_name = %self.config_name, "Starting Medplum Server...");

        // Registered first so a signal during startup is not lost.
        let _signals = self
            .os_signals
            .then(|| SignalSubscription::register(&self.shutdown, &self.faults));

        let (settings, mut app) = match self.start().await {
            Ok(started) => started,
            Err(error) => {
                tracing::error!(error = %error, "Error during startup");
                return SupervisorExit::StartupFailed(error);
            }
        };
        let coordinator = self.coordinator(&settings);
        let mut observed = coordinator.state();

        let report = {
            let run = coordinator.run(&self.shutdown, &mut app);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    report = &mut run => break report,
                    Ok(()) = observed.changed() => {
                        self.state.send_replace(*observed.borrow_and_update());
                    }
                }
            }
        };
        self.state.send_replace(ShutdownState::Finalized);

        SupervisorExit::Completed(report)
    }

    async fn start(&self) -> Result<(Settings, RunningApplication), StartupError> {
        let name: ConfigName = self.config_name.parse()?;
        let settings = self.config_source.load(&name).await?;
        tracing::info!(
            port = settings.port,
            log_level = ?settings.log_level,
            "Configuration loaded"
        );

        if let Some(level) = settings.log_level {
            self.log.set_level(level)?;
        }

        tracing::info!("Initializing application");
        let router = self.factory.build(&settings).await?;

        let addr = SocketAddr::new(self.host, settings.port);
        let app = HttpServer::new(router, ServeOptions::from(&settings))
            .bind(addr)
            .await?;
        app.set_keep_alive_timeout(settings.keep_alive_timeout());
        tracing::info!(port = settings.port, address = %app.local_addr(), "Server started");

        Ok((settings, app))
    }

    fn coordinator(&self, settings: &Settings) -> ShutdownCoordinator {
        if settings.shutdown_timeout_ms.is_none() {
            tracing::warn!(
                timeout_ms = settings.shutdown_timeout().as_millis() as u64,
                "shutdownTimeoutMs not configured, using default"
            );
        }
        let timeout = settings.shutdown_timeout();
        let timeout_ms = timeout.as_millis() as u64;
        let factory = Arc::clone(&self.factory);

        ShutdownCoordinator::new(timeout, self.environment)
            .pre_shutdown(move |signal| async move {
                tracing::info!(
                    signal = %signal,
                    "Shutdown signal received... allowing graceful shutdown for up to {timeout_ms} milliseconds"
                );
                Ok::<(), HookError>(())
            })
            .on_shutdown(move |_| async move { factory.shutdown().await.map_err(HookError::from) })
            .finally(|report| {
                tracing::info!(
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    timed_out = report.timed_out,
                    "Shutdown complete"
                );
            })
    }
}
