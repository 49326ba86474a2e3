//! Subcommand argument shapes and frame construction.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sdstore_core::{JobId, Priority};
use sdstore_ipc::Request;

/// `sdstore`: submit file-transformation jobs to `sdstored` and query its
/// status.
#[derive(Parser, Debug)]
#[command(name = "sdstore")]
#[command(author, version, about = "Client for the sdstored pipeline scheduler")]
pub struct Args {
    /// Unix-domain socket the daemon is listening on.
    #[arg(long, default_value = "/tmp/sdstore.sock")]
    pub socket: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a file through an ordered pipeline of filters.
    ProcFile {
        /// Submission priority; higher runs sooner.
        priority: u8,
        /// Input file to read.
        input: PathBuf,
        /// Output file to write.
        output: PathBuf,
        /// One or more filter names, in pipeline order.
        #[arg(required = true)]
        filters: Vec<String>,
    },
    /// Print the current ledger occupancy and active job list.
    Status,
    /// Cancel a previously submitted job.
    Cancel {
        /// The job id returned by the `Accepted` reply at submission time.
        job_id: u64,
    },
    /// Request an orderly shutdown of the daemon.
    Shutdown,
}

impl Command {
    /// Builds the wire `Request` this command sends to the daemon.
    /// `ProcFile` gets an `Accepted` reply followed later by a `Terminal`;
    /// every other command gets exactly one reply. The caller handles that
    /// reply-count difference itself, not this function.
    #[must_use]
    pub fn to_request(&self) -> Request {
        match self {
            Command::ProcFile {
                priority,
                input,
                output,
                filters,
            } => Request::Submit {
                priority: Priority(*priority),
                input_path: input.clone(),
                output_path: output.clone(),
                filters: filters.clone(),
            },
            Command::Status => Request::Status,
            Command::Cancel { job_id } => Request::Cancel {
                job_id: JobId(*job_id),
            },
            Command::Shutdown => Request::Shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proc_file_builds_a_submit_request_in_pipeline_order() {
        let command = Command::ProcFile {
            priority: 1,
            input: "/tmp/in".into(),
            output: "/tmp/out".into(),
            filters: vec!["bcompress".to_string(), "encrypt".to_string()],
        };
        let request = command.to_request();
        match request {
            Request::Submit {
                priority,
                filters,
                ..
            } => {
                assert_eq!(priority, Priority(1));
                assert_eq!(filters, vec!["bcompress", "encrypt"]);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn cancel_builds_a_cancel_request_with_the_given_job_id() {
        let command = Command::Cancel { job_id: 7 };
        assert!(matches!(
            command.to_request(),
            Request::Cancel {
                job_id: JobId(7)
            }
        ));
    }
}
