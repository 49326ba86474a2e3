//! The wire frames exchanged between `sdstore` and `sdstored`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use sdstore_core::{JobId, JobOutcome, Priority};

/// A request sent from a client to the daemon over one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Submit a new job.
    Submit {
        priority: Priority,
        input_path: PathBuf,
        output_path: PathBuf,
        filters: Vec<String>,
    },
    /// Ask for a snapshot of the ledger and the active job list.
    Status,
    /// Cancel a previously submitted job.
    Cancel { job_id: JobId },
    /// Request an orderly shutdown of the daemon.
    Shutdown,
}

/// One row of a `Status` reply: a filter kind's current occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRow {
    pub kind: String,
    pub running: usize,
    pub max: usize,
}

/// One row of a `Status` reply: one job's submission and current state,
/// enough for the client to render its `task #<id>: proc-file ...` line
/// without a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRow {
    pub job_id: JobId,
    pub state: String,
    pub priority: Priority,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub filters: Vec<String>,
}

/// A reply sent from the daemon back to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Reply {
    /// The submission was admitted into the pending queue.
    Accepted { job_id: JobId },
    /// Current ledger occupancy and active job list, for `Status`.
    Progress {
        transforms: Vec<TransformRow>,
        jobs: Vec<JobRow>,
    },
    /// The job reached a terminal state.
    Terminal { job_id: JobId, outcome: JobOutcome },
    /// The submission was rejected before ever entering the pending queue.
    Rejected { reason: String },
    /// A `Cancel` request named a job that is neither `Pending` nor
    /// `Running` (unknown, or already terminal).
    NotCancellable { job_id: JobId },
}
