//! The narrow interface a job's client handle must satisfy so that the
//! scheduler and the pipeline runner can notify a client without either of
//! them knowing anything about sockets or wire frames.

use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// How a job concluded. Carried to the client's reply sink; the control
/// plane crate maps this onto its own wire frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// Capability every `JobRecord<H>`'s `H` must provide: deliver the
/// `Accepted` acknowledgement and, exactly once, the terminal outcome.
///
/// `Accepted` must strictly precede the terminal reply on a connection;
/// implementations are responsible for that ordering (trivial if both
/// calls simply enqueue onto an ordered per-connection channel, which is
/// how the IPC transport implements it).
pub trait ReplySink: Send + Sync + 'static {
    /// Job was admitted into the pending queue.
    fn accepted(&self, job_id: JobId);

    /// Job reached a terminal state. Called exactly once per job.
    fn terminal(&self, job_id: JobId, outcome: JobOutcome);
}

/// A recording `ReplySink` for use in other crates' tests. Gated behind
/// the `test-util` feature rather than `#[cfg(test)]` so that downstream
/// crates (which compile this one as an ordinary dependency, not as a
/// member) can reach it from their own test code.
#[cfg(feature = "test-util")]
pub mod test_support {
    use super::{JobOutcome, ReplySink};
    use crate::job::JobId;
    use std::sync::{Arc, Mutex};

    /// A `ReplySink` that records every call, for assertions in tests.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        pub accepted: Arc<Mutex<Vec<JobId>>>,
        pub terminal: Arc<Mutex<Vec<(JobId, JobOutcome)>>>,
    }

    impl ReplySink for RecordingSink {
        fn accepted(&self, job_id: JobId) {
            self.accepted.lock().unwrap().push(job_id);
        }

        fn terminal(&self, job_id: JobId, outcome: JobOutcome) {
            self.terminal.lock().unwrap().push((job_id, outcome));
        }
    }
}
