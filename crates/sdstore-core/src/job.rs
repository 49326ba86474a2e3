//! Job identity, priority, state machine, and the job record itself.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::demand::SlotDemand;
use crate::filter::FilterKind;

/// Monotonically increasing job identifier, assigned by the job store and
/// never reused within a daemon lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Submission priority. Higher value runs sooner. Clients are expected to
/// send `0` or `1`, but the scheduler tolerates the full `u8` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Priority(pub u8);

/// A pipeline: an ordered, non-empty sequence of filter kinds applied
/// left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec(Vec<FilterKind>);

/// A pipeline with no filter stages was submitted.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("pipeline must have at least one filter")]
pub struct EmptyPipeline;

impl PipelineSpec {
    /// Builds a pipeline spec, rejecting an empty sequence.
    pub fn new(kinds: Vec<FilterKind>) -> Result<Self, EmptyPipeline> {
        if kinds.is_empty() {
            Err(EmptyPipeline)
        } else {
            Ok(Self(kinds))
        }
    }

    #[must_use]
    pub fn kinds(&self) -> &[FilterKind] {
        &self.0
    }

    #[must_use]
    pub fn demand(&self) -> SlotDemand {
        SlotDemand::from_pipeline(&self.0)
    }
}

/// Lifecycle state of a job. Initial `Pending`; terminal states are
/// `Completed`, `Failed`, `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// Whether `self -> next` is one of the legal transitions:
    /// `Pending->Running`, `Pending->Cancelled`, `Running->Completed`,
    /// `Running->Failed`, `Running->Cancelled`. Terminal states have no
    /// outgoing transitions.
    #[must_use]
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Cancelled)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::Cancelled)
        )
    }
}

/// A job as tracked by the job store, from submission until its terminal
/// reply has been sent. Generic over `H`, the opaque per-connection reply
/// sink (owned by the control plane crate, not named here, so this crate
/// stays free of any transport dependency).
#[derive(Debug, Clone)]
pub struct JobRecord<H> {
    pub job_id: JobId,
    pub client_handle: H,
    pub priority: Priority,
    pub input_path: std::path::PathBuf,
    pub output_path: std::path::PathBuf,
    pub pipeline: PipelineSpec,
    pub demand: SlotDemand,
    pub state: JobState,
    pub admitted_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl<H> JobRecord<H> {
    #[must_use]
    pub fn new(
        job_id: JobId,
        client_handle: H,
        priority: Priority,
        input_path: std::path::PathBuf,
        output_path: std::path::PathBuf,
        pipeline: PipelineSpec,
    ) -> Self {
        let demand = pipeline.demand();
        Self {
            job_id,
            client_handle,
            priority,
            input_path,
            output_path,
            pipeline,
            demand,
            state: JobState::Pending,
            admitted_at: None,
            finished_at: None,
        }
    }

    /// Applies `next`, returning an error if the transition is illegal.
    /// Timestamps are stamped on `Running` (`admitted_at`) and on any
    /// terminal transition (`finished_at`).
    pub fn transition(&mut self, next: JobState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        if next == JobState::Running {
            self.admitted_at = Some(Instant::now());
        }
        if next.is_terminal() {
            self.finished_at = Some(Instant::now());
        }
        self.state = next;
        Ok(())
    }
}

/// A `JobRecord` transition that violates the lifecycle state machine.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("illegal job state transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: JobState,
    pub to: JobState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_spec_rejects_empty() {
        assert!(PipelineSpec::new(vec![]).is_err());
    }

    #[test]
    fn legal_transitions_are_accepted() {
        let mut record = JobRecord::new(
            JobId(1),
            (),
            Priority(0),
            "/tmp/in".into(),
            "/tmp/out".into(),
            PipelineSpec::new(vec![FilterKind::Nop]).unwrap(),
        );
        assert!(record.transition(JobState::Running).is_ok());
        assert!(record.admitted_at.is_some());
        assert!(record.transition(JobState::Completed).is_ok());
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut record = JobRecord::new(
            JobId(1),
            (),
            Priority(0),
            "/tmp/in".into(),
            "/tmp/out".into(),
            PipelineSpec::new(vec![FilterKind::Nop]).unwrap(),
        );
        assert!(record.transition(JobState::Completed).is_err());
        assert_eq!(record.state, JobState::Pending);
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for terminal in [JobState::Completed, JobState::Failed, JobState::Cancelled] {
            for next in [
                JobState::Pending,
                JobState::Running,
                JobState::Completed,
                JobState::Failed,
                JobState::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn priority_ordering_is_higher_value_first() {
        assert!(Priority(1) > Priority(0));
    }
}
