//! sdstored - admission-controlled filter pipeline scheduler daemon.
//!
//! ## Usage
//!
//! ```text
//! sdstored <config-path> <filter-dir> [--socket <path>]
//! ```
//!
//! Parses the budget file at `<config-path>`, resolves filter executables
//! under `<filter-dir>`, and listens for client connections on `--socket`
//! (`/tmp/sdstore.sock` by default). Exits 0 on a clean `Shutdown` request,
//! non-zero with a logged cause on a startup `ConfigError`.

mod config;
mod control;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use sdstore_events::channel as events_channel;
use sdstore_executor::{PipelineRunner, RunningRegistry};
use sdstore_ipc::UnixTransport;
use sdstore_worker::{BudgetLedger, JobStore, RunningCanceller, Scheduler};

use control::{ConnectionHandle, DaemonContext, RunnerDispatcher};

#[derive(Parser, Debug)]
#[command(name = "sdstored")]
#[command(author, version, about = "Admission-controlled filter pipeline scheduler daemon")]
struct Args {
    /// Path to the filter-budget file.
    config_path: PathBuf,
    /// Directory containing the filter executables.
    filter_dir: PathBuf,
    /// Unix-domain socket path to listen on.
    #[arg(long, default_value = "/tmp/sdstore.sock")]
    socket: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let catalogue = match config::load_catalogue(&args.config_path, &args.filter_dir) {
        Ok(catalogue) => Arc::new(catalogue),
        Err(err) => {
            tracing::error!(%err, "failed to start: bad configuration");
            return ExitCode::FAILURE;
        }
    };

    let ledger = BudgetLedger::new(catalogue.clone());
    let store: JobStore<ConnectionHandle> = JobStore::new();
    let (events_tx, events_rx) = events_channel();
    let registry = RunningRegistry::new();

    let runner = PipelineRunner::new(
        catalogue.clone(),
        ledger.clone(),
        store.clone(),
        events_tx.clone(),
        registry.clone(),
    );
    let dispatcher = Arc::new(RunnerDispatcher::new(runner));
    let running_canceller: Arc<dyn RunningCanceller> = Arc::new(registry.clone());
    let scheduler = Scheduler::new(
        store.clone(),
        ledger.clone(),
        dispatcher,
        running_canceller,
        events_rx,
    );
    let scheduler_handle = tokio::spawn(scheduler.run());

    let transport = match UnixTransport::bind(&args.socket) {
        Ok(transport) => transport,
        Err(err) => {
            tracing::error!(%err, "failed to start: could not bind control socket");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(socket = %args.socket.display(), "sdstored listening");

    let ctx = DaemonContext {
        catalogue,
        ledger,
        store,
        events: events_tx,
    };
    control::serve(transport, ctx).await;

    if let Err(err) = scheduler_handle.await {
        tracing::error!(%err, "scheduler task panicked");
        return ExitCode::FAILURE;
    }

    tracing::info!("sdstored shut down cleanly");
    ExitCode::SUCCESS
}
