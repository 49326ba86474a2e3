//! Admission scheduler (C5): the event-driven loop that turns `Pending`
//! jobs into `Running` ones.
//!
//! The scheduler owns the pending queue exclusively (it is not behind a
//! lock) and reacts to one `SchedulerEvent` at a time, running a single
//! admission pass after each. It never polls.

use std::sync::Arc;

use sdstore_core::{FilterKind, JobId, JobRecord, JobState, JobOutcome, ReplySink};
use sdstore_events::{SchedulerEvent, SchedulerEventReceiver};

use crate::ledger::BudgetLedger;
use crate::queue::PendingQueue;
use crate::store::JobStore;

/// Hands an admitted job off to whatever runs it. Implemented by the
/// daemon binary, which bridges to the pipeline runner; kept as a trait so
/// this crate never depends on process-spawning machinery.
pub trait JobDispatcher<H>: Send + Sync {
    /// Run `record`, which has already transitioned to `Running` and had
    /// its slots reserved in the ledger.
    fn dispatch(&self, record: JobRecord<H>);
}

/// Requests cancellation of a job that is no longer in the pending queue.
/// Implemented by the daemon binary over its `RunningRegistry`; kept as a
/// trait so this crate never depends on process-spawning machinery.
pub trait RunningCanceller: Send + Sync {
    /// Returns `false` if `job_id` is not currently running (it already
    /// reached a terminal state, or never existed).
    fn cancel_running(&self, job_id: JobId) -> bool;
}

/// The admission loop. Construct with `Scheduler::new`, then drive it with
/// `run` on its own task.
pub struct Scheduler<H> {
    queue: PendingQueue,
    store: JobStore<H>,
    ledger: BudgetLedger,
    dispatcher: Arc<dyn JobDispatcher<H>>,
    running: Arc<dyn RunningCanceller>,
    events: SchedulerEventReceiver,
    shutting_down: bool,
}

impl<H: Clone + ReplySink> Scheduler<H> {
    #[must_use]
    pub fn new(
        store: JobStore<H>,
        ledger: BudgetLedger,
        dispatcher: Arc<dyn JobDispatcher<H>>,
        running: Arc<dyn RunningCanceller>,
        events: SchedulerEventReceiver,
    ) -> Self {
        Self {
            queue: PendingQueue::new(),
            store,
            ledger,
            dispatcher,
            running,
            events,
            shutting_down: false,
        }
    }

    /// Runs until every sender has dropped or a shutdown has fully drained.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle_event(event);
            if self.shutting_down && self.store.iter_active().is_empty() {
                tracing::info!("scheduler drained, shutting down");
                return;
            }
            if !self.shutting_down {
                self.admission_pass();
            }
        }
    }

    fn handle_event(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Submitted(job_id) => {
                if let Some(record) = self.store.get(job_id) {
                    self.queue.push(record.priority, job_id);
                } else {
                    tracing::warn!(%job_id, "submitted event for unknown job");
                }
            }
            SchedulerEvent::Finished(job_id) => {
                tracing::debug!(%job_id, "job finished, slots already released");
            }
            SchedulerEvent::Cancelled(job_id) => {
                self.cancel(job_id);
            }
            SchedulerEvent::Shutdown => {
                self.shutting_down = true;
                self.cancel_all_pending();
            }
        }
    }

    /// Cancels `job_id`, deciding atomically whether it is still in the
    /// pending queue or has since been admitted. The queue is owned
    /// exclusively by this task, so a successful `remove` here is a
    /// decisive answer: no admission pass can have run between the queue
    /// check and this decision. If the job is no longer pending it has
    /// either already been dispatched as `Running` (fall through to the
    /// running registry) or is unknown/already terminal (no-op).
    fn cancel(&mut self, job_id: JobId) {
        if self.queue.remove(job_id) {
            self.finish_pending_cancel(job_id);
            return;
        }
        if !self.running.cancel_running(job_id) {
            tracing::debug!(%job_id, "cancel requested for a job that is no longer cancellable");
        }
    }

    /// Transitions a just-dequeued pending job to `Cancelled` and notifies
    /// its client.
    fn finish_pending_cancel(&mut self, job_id: JobId) {
        let Some(record) = self.store.get(job_id) else {
            return;
        };
        if let Err(err) = self.store.set_state(job_id, JobState::Cancelled) {
            tracing::error!(%job_id, %err, "failed to mark cancelled pending job as Cancelled");
            return;
        }
        record.client_handle.terminal(job_id, JobOutcome::Cancelled);
    }

    fn cancel_all_pending(&mut self) {
        for entry in self.queue.admission_order() {
            if self.queue.remove(entry.job_id) {
                self.finish_pending_cancel(entry.job_id);
            }
        }
    }

    /// One pass over the pending queue in priority-then-FIFO order.
    /// A job whose demand cannot be reserved marks every filter kind in its
    /// demand as "blocked" for the remainder of this pass; any later job
    /// (necessarily lower priority or later-submitted) that needs any
    /// blocked kind is skipped without being tried, so one job stuck behind
    /// a full budget can never starve a disjoint job lower in the queue.
    fn admission_pass(&mut self) {
        let order = self.queue.admission_order();
        let mut blocked = [false; 7];

        for entry in order {
            let Some(record) = self.store.get(entry.job_id) else {
                continue;
            };
            if record.state != JobState::Pending {
                continue;
            }

            let demand = &record.demand;
            let is_blocked = FilterKind::ALL
                .into_iter()
                .any(|k| demand.get(k) > 0 && blocked[k.index()]);
            if is_blocked {
                continue;
            }

            if self.ledger.try_reserve(demand) {
                self.queue.remove(entry.job_id);
                if let Err(err) = self.store.set_state(entry.job_id, JobState::Running) {
                    tracing::error!(job_id = %entry.job_id, %err, "admitted job could not transition to Running");
                    self.ledger.release(demand);
                    continue;
                }
                let record = self
                    .store
                    .get(entry.job_id)
                    .expect("just transitioned, cannot have vanished");
                self.dispatcher.dispatch(record);
            } else {
                for kind in FilterKind::ALL {
                    if demand.get(kind) > 0 {
                        blocked[kind.index()] = true;
                    }
                }
            }
        }
    }
}
