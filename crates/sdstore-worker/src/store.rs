//! Job record store (C3): the registry of all active jobs, keyed by
//! monotonic job id.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use sdstore_core::{IllegalTransition, JobId, JobRecord, JobState, PipelineSpec, Priority};

/// Thread-safe registry of job records.
///
/// Generic over `H`, the opaque per-connection reply handle threaded
/// through from the control plane — this crate never inspects it.
#[derive(Debug, Clone)]
pub struct JobStore<H> {
    jobs: Arc<DashMap<JobId, JobRecord<H>>>,
    next_id: Arc<AtomicU64>,
}

impl<H: Clone> Default for JobStore<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone> JobStore<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Creates a new `Pending` job record and assigns it the next job id.
    /// Never reuses an id within the store's lifetime, even across
    /// `remove` calls.
    pub fn create(
        &self,
        client_handle: H,
        priority: Priority,
        input_path: PathBuf,
        output_path: PathBuf,
        pipeline: PipelineSpec,
    ) -> JobId {
        let job_id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = JobRecord::new(
            job_id,
            client_handle,
            priority,
            input_path,
            output_path,
            pipeline,
        );
        self.jobs.insert(job_id, record);
        job_id
    }

    /// Returns a clone of the record, if it is still tracked.
    #[must_use]
    pub fn get(&self, job_id: JobId) -> Option<JobRecord<H>> {
        self.jobs.get(&job_id).map(|r| r.value().clone())
    }

    /// Transitions a job's state, enforcing the legal-transition rules in
    /// `sdstore_core::JobState`.
    pub fn set_state(&self, job_id: JobId, next: JobState) -> Result<(), SetStateError> {
        let mut entry = self
            .jobs
            .get_mut(&job_id)
            .ok_or(SetStateError::NotFound(job_id))?;
        entry.transition(next)?;
        Ok(())
    }

    /// All records currently `Pending` or `Running`.
    #[must_use]
    pub fn iter_active(&self) -> Vec<JobRecord<H>> {
        self.jobs
            .iter()
            .filter(|r| !r.state.is_terminal())
            .map(|r| r.value().clone())
            .collect()
    }

    /// All records still `Pending`, for scheduler admission passes.
    #[must_use]
    pub fn iter_pending(&self) -> Vec<JobRecord<H>> {
        self.jobs
            .iter()
            .filter(|r| r.state == JobState::Pending)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Drops a record from the store. Callers must only do this after the
    /// job's terminal reply has been written — the client handle is only
    /// safe to close once no further notification will target it.
    pub fn remove(&self, job_id: JobId) {
        self.jobs.remove(&job_id);
    }
}

/// `set_state` failed: the job is gone, or the transition is illegal.
#[derive(Debug, thiserror::Error)]
pub enum SetStateError {
    #[error("job {0} not found in the store")]
    NotFound(JobId),
    #[error(transparent)]
    Illegal(#[from] IllegalTransition),
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdstore_core::FilterKind;

    fn pipeline() -> PipelineSpec {
        PipelineSpec::new(vec![FilterKind::Nop]).unwrap()
    }

    #[test]
    fn job_ids_are_monotonic_and_never_reused() {
        let store: JobStore<()> = JobStore::new();
        let a = store.create((), Priority(0), "/in".into(), "/out-a".into(), pipeline());
        let b = store.create((), Priority(0), "/in".into(), "/out-b".into(), pipeline());
        assert!(b.0 > a.0);

        store.remove(a);
        let c = store.create((), Priority(0), "/in".into(), "/out-c".into(), pipeline());
        assert!(c.0 > b.0, "ids must never be reused even after removal");
    }

    #[test]
    fn set_state_enforces_legal_transitions() {
        let store: JobStore<()> = JobStore::new();
        let id = store.create((), Priority(0), "/in".into(), "/out".into(), pipeline());

        assert!(store.set_state(id, JobState::Completed).is_err());
        assert!(store.set_state(id, JobState::Running).is_ok());
        assert!(store.set_state(id, JobState::Completed).is_ok());

        let record = store.get(id).unwrap();
        assert_eq!(record.state, JobState::Completed);
    }

    #[test]
    fn iter_active_excludes_terminal_jobs() {
        let store: JobStore<()> = JobStore::new();
        let running = store.create((), Priority(0), "/in".into(), "/out1".into(), pipeline());
        let done = store.create((), Priority(0), "/in".into(), "/out2".into(), pipeline());
        store.set_state(running, JobState::Running).unwrap();
        store.set_state(done, JobState::Running).unwrap();
        store.set_state(done, JobState::Completed).unwrap();

        let active: Vec<_> = store.iter_active().into_iter().map(|r| r.job_id).collect();
        assert_eq!(active, vec![running]);
    }

    #[test]
    fn set_state_on_unknown_job_is_not_found() {
        let store: JobStore<()> = JobStore::new();
        let err = store.set_state(JobId(999), JobState::Running).unwrap_err();
        assert!(matches!(err, SetStateError::NotFound(JobId(999))));
    }
}
