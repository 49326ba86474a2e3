//! The control plane (C6): demultiplexes client connections into
//! `Request`s, drives the scheduler and runner through them, and routes
//! replies back to whichever connection submitted the job.

use std::sync::Arc;

use tokio::net::UnixStream;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use sdstore_core::{validate_submission, FilterCatalogue, JobId, JobOutcome, JobState, ReplySink};
use sdstore_events::SchedulerEventSender;
use sdstore_executor::PipelineRunner;
use sdstore_ipc::{Connection, JobRow, Reply, Request, TransformRow, UnixTransport};
use sdstore_worker::{BudgetLedger, JobDispatcher, JobStore};

/// A job's client handle: forwards `accepted`/`terminal` notifications
/// onto the connection's outbound reply queue. Cheap to clone — every
/// job submitted on a connection gets its own clone.
///
/// Carries the connection's correlation id so log lines about a job can
/// be traced back to the connection that submitted it.
#[derive(Clone)]
pub struct ConnectionHandle {
    connection_id: Uuid,
    replies: mpsc::UnboundedSender<Reply>,
}

impl ConnectionHandle {
    fn reject(&self, reason: impl Into<String>) {
        let _ = self.replies.send(Reply::Rejected {
            reason: reason.into(),
        });
    }

    fn not_cancellable(&self, job_id: JobId) {
        let _ = self.replies.send(Reply::NotCancellable { job_id });
    }

    fn progress(&self, transforms: Vec<TransformRow>, jobs: Vec<JobRow>) {
        let _ = self.replies.send(Reply::Progress { transforms, jobs });
    }
}

impl ReplySink for ConnectionHandle {
    fn accepted(&self, job_id: JobId) {
        tracing::debug!(connection_id = %self.connection_id, %job_id, "accepted");
        let _ = self.replies.send(Reply::Accepted { job_id });
    }

    fn terminal(&self, job_id: JobId, outcome: JobOutcome) {
        tracing::debug!(connection_id = %self.connection_id, %job_id, ?outcome, "terminal");
        let _ = self.replies.send(Reply::Terminal { job_id, outcome });
    }
}

/// Hands an admitted job to a freshly spawned `tokio` task running its
/// pipeline.
pub struct RunnerDispatcher {
    runner: PipelineRunner<ConnectionHandle>,
}

impl RunnerDispatcher {
    #[must_use]
    pub fn new(runner: PipelineRunner<ConnectionHandle>) -> Self {
        Self { runner }
    }
}

impl JobDispatcher<ConnectionHandle> for RunnerDispatcher {
    fn dispatch(&self, record: sdstore_core::JobRecord<ConnectionHandle>) {
        let runner = self.runner.clone();
        tokio::spawn(async move { runner.run(record).await });
    }
}

/// Shared, cheaply cloneable state every connection handler needs.
#[derive(Clone)]
pub struct DaemonContext {
    pub catalogue: Arc<FilterCatalogue>,
    pub ledger: BudgetLedger,
    pub store: JobStore<ConnectionHandle>,
    pub events: SchedulerEventSender,
}

/// Accepts connections on `transport` until a `Shutdown` request arrives,
/// then stops accepting and returns. Each connection runs on its own task
/// for as long as the client keeps it open.
pub async fn serve(transport: UnixTransport, ctx: DaemonContext) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accepted = transport.accept() => {
                match accepted {
                    Ok(stream) => {
                        let ctx = ctx.clone();
                        let shutdown_tx = shutdown_tx.clone();
                        tokio::spawn(async move { handle_connection(stream, ctx, shutdown_tx).await });
                    }
                    Err(err) => tracing::warn!(%err, "failed to accept a connection"),
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("shutdown requested, no longer accepting connections");
                return;
            }
        }
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    ctx: DaemonContext,
    shutdown_tx: watch::Sender<bool>,
) {
    let connection_id = Uuid::new_v4();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle {
        connection_id,
        replies: reply_tx,
    };
    tracing::debug!(%connection_id, "client connected");
    let mut submitted_jobs = Vec::new();

    loop {
        tokio::select! {
            request = stream.recv_request() => {
                match request {
                    Ok(request) => handle_request(request, &ctx, &handle, &shutdown_tx, &mut submitted_jobs).await,
                    Err(sdstore_ipc::CodecError::Eof) => break,
                    Err(err) => {
                        tracing::warn!(%err, "connection error, closing");
                        break;
                    }
                }
            }
            Some(reply) = reply_rx.recv() => {
                if let Err(err) = stream.send_reply(&reply).await {
                    tracing::warn!(%err, "failed to write reply, closing connection");
                    break;
                }
            }
        }
    }

    // A disconnected client can no longer cancel its own jobs or see their
    // replies; treat every job it submitted that hasn't reached a terminal
    // state yet as implicitly cancelled.
    for job_id in submitted_jobs {
        if request_cancel(&ctx, job_id) {
            tracing::debug!(%connection_id, %job_id, "client disconnected, implicitly cancelling");
        }
    }
}

async fn handle_request(
    request: Request,
    ctx: &DaemonContext,
    handle: &ConnectionHandle,
    shutdown_tx: &watch::Sender<bool>,
    submitted_jobs: &mut Vec<JobId>,
) {
    match request {
        Request::Submit {
            priority,
            input_path,
            output_path,
            filters,
        } => {
            match validate_submission(&input_path, &output_path, &filters, &ctx.catalogue) {
                Ok((pipeline, _demand)) => {
                    let job_id =
                        ctx.store
                            .create(handle.clone(), priority, input_path, output_path, pipeline);
                    submitted_jobs.push(job_id);
                    handle.accepted(job_id);
                    if let Err(err) = ctx.events.submitted(job_id) {
                        tracing::error!(%job_id, %err, "scheduler unavailable");
                    }
                }
                Err(err) => handle.reject(err.to_string()),
            }
        }
        Request::Status => {
            handle.progress(ctx.snapshot_transforms(), ctx.snapshot_jobs());
        }
        Request::Cancel { job_id } => {
            if !request_cancel(ctx, job_id) {
                handle.not_cancellable(job_id);
            }
        }
        Request::Shutdown => {
            let _ = ctx.events.shutdown();
            let _ = shutdown_tx.send(true);
        }
    }
}

/// Forwards a cancel request for `job_id` to the scheduler, which owns the
/// pending queue and is the only place that can decide — without racing an
/// admission pass — whether the job is still pending or has already been
/// dispatched as running. Returns `false` without sending anything if the
/// job is unknown or already terminal, in which case the scheduler would
/// have nothing left to act on.
fn request_cancel(ctx: &DaemonContext, job_id: JobId) -> bool {
    match ctx.store.get(job_id) {
        Some(record) if !record.state.is_terminal() => {
            if let Err(err) = ctx.events.cancelled(job_id) {
                tracing::error!(%job_id, %err, "scheduler unavailable");
            }
            true
        }
        _ => false,
    }
}

impl DaemonContext {
    fn snapshot_transforms(&self) -> Vec<TransformRow> {
        self.ledger
            .snapshot()
            .into_iter()
            .map(|row| TransformRow {
                kind: row.kind.name().to_string(),
                running: row.running,
                max: row.max,
            })
            .collect()
    }

    fn snapshot_jobs(&self) -> Vec<JobRow> {
        self.store
            .iter_active()
            .into_iter()
            .map(|record| JobRow {
                job_id: record.job_id,
                state: job_state_name(record.state).to_string(),
                priority: record.priority,
                input_path: record.input_path.clone(),
                output_path: record.output_path.clone(),
                filters: record
                    .pipeline
                    .kinds()
                    .iter()
                    .map(|k| k.name().to_string())
                    .collect(),
            })
            .collect()
    }
}

fn job_state_name(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "pending",
        JobState::Running => "running",
        JobState::Completed => "completed",
        JobState::Failed => "failed",
        JobState::Cancelled => "cancelled",
    }
}
