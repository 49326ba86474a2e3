//! The pipeline runner: one task per `Running` job, spawning its chain of
//! filter processes and awaiting them to completion.

use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, Command};

use sdstore_core::{FilterCatalogue, JobId, JobOutcome, JobRecord, JobState, ReplySink};
use sdstore_events::SchedulerEventSender;
use sdstore_worker::{BudgetLedger, JobStore};

use crate::guard::ReleaseGuard;
use crate::registry::RunningRegistry;

/// Runs admitted jobs' filter pipelines to completion.
///
/// Cheap to clone; every `Running` job gets its own `tokio::spawn`ed task
/// that calls `run` on a clone of this. Knows nothing about the pending
/// queue or admission policy — it only ever sees jobs already transitioned
/// to `Running` with their slots already reserved.
#[derive(Clone)]
pub struct PipelineRunner<H> {
    catalogue: Arc<FilterCatalogue>,
    ledger: BudgetLedger,
    store: JobStore<H>,
    events: SchedulerEventSender,
    registry: RunningRegistry,
}

enum RunOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

impl<H: Clone + ReplySink> PipelineRunner<H> {
    #[must_use]
    pub fn new(
        catalogue: Arc<FilterCatalogue>,
        ledger: BudgetLedger,
        store: JobStore<H>,
        events: SchedulerEventSender,
        registry: RunningRegistry,
    ) -> Self {
        Self {
            catalogue,
            ledger,
            store,
            events,
            registry,
        }
    }

    /// Exposes the registry so the control plane can route `Cancel`
    /// requests for `Running` jobs straight to their runner task.
    #[must_use]
    pub fn registry(&self) -> &RunningRegistry {
        &self.registry
    }

    /// Runs `record`'s pipeline to completion. `record` must already be
    /// `Running` with its demand reserved in `self.ledger` — the caller
    /// (the scheduler's dispatcher) is responsible for both.
    pub async fn run(&self, record: JobRecord<H>) {
        let job_id = record.job_id;
        let demand = record.demand;
        let guard = ReleaseGuard::new(self.ledger.clone(), demand);
        let cancel = self.registry.register(job_id);

        let outcome = tokio::select! {
            result = self.run_children(&record) => result,
            () = cancel.notified() => {
                tracing::info!(%job_id, "pipeline cancelled mid-run");
                RunOutcome::Cancelled
            }
        };

        self.registry.unregister(job_id);
        drop(guard);

        let next_state = match &outcome {
            RunOutcome::Completed => JobState::Completed,
            RunOutcome::Failed(reason) => {
                tracing::warn!(%job_id, %reason, "pipeline failed");
                JobState::Failed
            }
            RunOutcome::Cancelled => JobState::Cancelled,
        };
        if let Err(err) = self.store.set_state(job_id, next_state) {
            tracing::error!(%job_id, %err, "runner could not record terminal state");
        }

        if let Err(err) = self.events.finished(job_id) {
            tracing::warn!(%job_id, %err, "scheduler event channel closed while finishing job");
        }

        let reply_outcome = match outcome {
            RunOutcome::Completed => JobOutcome::Completed,
            RunOutcome::Failed(reason) => JobOutcome::Failed(reason),
            RunOutcome::Cancelled => JobOutcome::Cancelled,
        };
        record.client_handle.terminal(job_id, reply_outcome);
    }

    async fn run_children(&self, record: &JobRecord<H>) -> RunOutcome {
        let mut children = match self.spawn_chain(record).await {
            Ok(children) => children,
            Err(err) => return RunOutcome::Failed(err),
        };

        let statuses = futures::future::join_all(children.iter_mut().map(Child::wait)).await;

        for status in statuses {
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    return RunOutcome::Failed(format!("filter exited with {status}"));
                }
                Err(err) => return RunOutcome::Failed(format!("failed to wait on filter: {err}")),
            }
        }
        RunOutcome::Completed
    }

    /// Spawns every child in the chain before awaiting any of them,
    /// wiring each interior child's piped stdout directly into the next
    /// child's stdin so no pipe endpoint is retained past spawn time.
    async fn spawn_chain(&self, record: &JobRecord<H>) -> Result<Vec<Child>, String> {
        let kinds = record.pipeline.kinds();
        let input = open_input(&record.input_path).map_err(|e| e.to_string())?;
        let output = open_output(&record.output_path).map_err(|e| e.to_string())?;

        let mut children = Vec::with_capacity(kinds.len());
        let mut next_stdin = Some(Stdio::from(input));
        let mut output = Some(output);

        for (idx, kind) in kinds.iter().enumerate() {
            let is_last = idx + 1 == kinds.len();
            let path = self.catalogue.entry(*kind).executable_path.clone();

            let mut command = Command::new(&path);
            command
                .stdin(next_stdin.take().expect("set for every iteration"))
                .kill_on_drop(true);

            if is_last {
                let output = output.take().expect("output file consumed exactly once");
                command.stdout(Stdio::from(output));
            } else {
                command.stdout(Stdio::piped());
            }

            let mut child = command
                .spawn()
                .map_err(|e| format!("failed to spawn {kind} ({}): {e}", path.display()))?;

            if !is_last {
                let stdout = child.stdout.take().expect("stdout piped above");
                let stdio: Stdio = stdout
                    .try_into()
                    .map_err(|e| format!("failed to chain stdout of {kind}: {e}"))?;
                next_stdin = Some(stdio);
            }

            children.push(child);
        }

        Ok(children)
    }
}

fn open_input(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::open(path)
}

fn open_output(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}
