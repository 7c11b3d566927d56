//! Medplum Server
//!
//! Process entry point: runs the HTTP server under the lifecycle
//! supervisor, or seeds the bootstrap records.
//!
//! # Architecture Overview
//!
//! ```text
//!     medplum-server [serve]
//!     ───────────────────────┐
//!                            ▼
//!                  ┌───────────────────┐     ┌──────────┐
//!                  │    Supervisor     │────▶│  config  │  CONFIG_NAME
//!                  │  (fault hooks,    │     └──────────┘
//!                  │   signals)        │     ┌──────────┐
//!                  │                   │────▶│   http   │  bind, keep-alive
//!                  └─────────┬─────────┘     └──────────┘
//!                            │ SIGINT / SIGTERM
//!                            ▼
//!                  ┌───────────────────┐
//!                  │ShutdownCoordinator│  pre-shutdown → drain → close → finally
//!                  └───────────────────┘
//!
//!     medplum-server seed --store <path>
//!     ───────────────────────┐
//!                            ▼
//!                  ┌───────────────────┐     ┌──────────────────┐
//!                  │   SeedProcedure   │────▶│ MemoryRepository │  JSON snapshot
//!                  └───────────────────┘     └──────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use medplum_server::config::{config_name_from_env, Environment, FileConfigSource};
use medplum_server::fhir::MemoryRepository;
use medplum_server::http::DefaultApplication;
use medplum_server::lifecycle::{FaultHandler, Supervisor, SupervisorExit, TerminationListener};
use medplum_server::observability::LogHandle;
use medplum_server::seed::{BcryptHasher, SeedOutcome, SeedProcedure};

#[derive(Parser)]
#[command(name = "medplum-server")]
#[command(about = "Medplum server process", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Create the bootstrap administrator records
    Seed {
        /// JSON snapshot backing the repository
        #[arg(long, default_value = "medplum.store.json")]
        store: PathBuf,

        #[arg(long, default_value_t = medplum_server::seed::password::DEFAULT_BCRYPT_COST)]
        bcrypt_cost: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();
    let environment = Environment::from_env();
    let log = LogHandle::init(environment)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(environment, log).await,
        Commands::Seed { store, bcrypt_cost } => seed(store, bcrypt_cost).await,
    }
}

async fn serve(
    environment: Environment,
    log: LogHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    // Held until return so fault handling outlives a failed startup.
    let faults = FaultHandler::default();
    let _panic_hook = faults.install();
    let mut termination = TerminationListener::new()?;

    let supervisor = Supervisor::new(
        config_name_from_env(),
        Arc::new(FileConfigSource::new()),
        Arc::new(DefaultApplication::new()),
    )
    .environment(environment)
    .log_handle(log)
    .fault_handler(faults.clone())
    .without_process_hooks();

    match supervisor.run().await {
        SupervisorExit::Completed(report) => {
            tracing::info!(
                signal = %report.signal,
                timed_out = report.timed_out,
                "Server stopped"
            );
        }
        SupervisorExit::StartupFailed(error) => {
            // Stay alive without serving; an external supervisor decides
            // whether to restart.
            tracing::warn!(error = %error, "Server did not start, waiting for termination signal");
            let signal = termination.recv().await?;
            tracing::info!(signal = %signal, "Exiting");
        }
    }
    Ok(())
}

async fn seed(store: PathBuf, bcrypt_cost: u32) -> Result<(), Box<dyn std::error::Error>> {
    let repo = Arc::new(MemoryRepository::load_from_file(&store)?);
    let procedure = SeedProcedure::new(repo.clone(), Arc::new(BcryptHasher::new(bcrypt_cost)));

    let outcome = procedure.seed().await;
    // Partial writes are kept, so persist even on failure.
    repo.persist()?;

    match outcome? {
        SeedOutcome::Seeded(report) => {
            tracing::info!(
                user = %report.user,
                project = %report.project,
                store = %store.display(),
                "Bootstrap records written"
            );
        }
        SeedOutcome::AlreadySeeded => {}
    }
    Ok(())
}
