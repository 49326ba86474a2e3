//! Tracks the cancellation handle for every currently `Running` job, so a
//! `Cancel` request for a running job can reach its runner task without
//! the runner task being reachable from anywhere else.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;

use sdstore_core::JobId;
use sdstore_worker::RunningCanceller;

/// Registry of running jobs' cancellation handles.
#[derive(Debug, Clone, Default)]
pub struct RunningRegistry {
    handles: Arc<DashMap<JobId, Arc<Notify>>>,
}

impl RunningRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job_id` as running and returns the handle its runner
    /// task should await alongside the pipeline's completion.
    pub(crate) fn register(&self, job_id: JobId) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.handles.insert(job_id, notify.clone());
        notify
    }

    /// Drops the registration once the job has reached a terminal state.
    pub(crate) fn unregister(&self, job_id: JobId) {
        self.handles.remove(&job_id);
    }

    /// Requests cancellation of a running job. Returns `false` if `job_id`
    /// is not currently tracked as running (already finished, or was never
    /// admitted), in which case the caller has nothing further to do.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.handles.get(&job_id) {
            Some(notify) => {
                notify.notify_one();
                true
            }
            None => false,
        }
    }
}

impl RunningCanceller for RunningRegistry {
    fn cancel_running(&self, job_id: JobId) -> bool {
        self.cancel(job_id)
    }
}
