//! Renders `Reply` frames into the lines a user reads on stdout/stderr.

use sdstore_core::JobOutcome;
use sdstore_ipc::{JobRow, Reply, TransformRow};

/// Renders a job's task line: `task #<id>: proc-file <priority> <input>
/// <output> <filter...>`.
fn task_line(row: &JobRow) -> String {
    let filters = row.filters.join(" ");
    format!(
        "task #{}: proc-file {} {} {} {} [{}]",
        row.job_id,
        row.priority.0,
        row.input_path.display(),
        row.output_path.display(),
        filters,
        row.state,
    )
}

/// Renders one filter kind's occupancy line: `transf <kind>:
/// <running>/<max> (running/max)`.
fn transf_line(row: &TransformRow) -> String {
    format!("transf {}: {}/{} (running/max)", row.kind, row.running, row.max)
}

/// Renders a `Progress` reply's job and transform rows, in the order the
/// daemon sent them (jobs first, one transf line per catalogue entry).
pub fn render_status(transforms: &[TransformRow], jobs: &[JobRow]) -> String {
    let mut lines = Vec::with_capacity(transforms.len() + jobs.len());
    for job in jobs {
        lines.push(task_line(job));
    }
    for transform in transforms {
        lines.push(transf_line(transform));
    }
    lines.join("\n")
}

/// Renders any reply that isn't a `Progress` snapshot, for `proc-file` and
/// `cancel` commands.
pub fn render_reply(reply: &Reply) -> String {
    match reply {
        Reply::Accepted { job_id } => format!("pending: job #{job_id} accepted"),
        Reply::Terminal { job_id, outcome } => match outcome {
            JobOutcome::Completed => format!("concluído: job #{job_id} completed"),
            JobOutcome::Failed(reason) => format!("recusado: job #{job_id} failed: {reason}"),
            JobOutcome::Cancelled => format!("cancelled: job #{job_id}"),
        },
        Reply::Rejected { reason } => format!("recusado: {reason}"),
        Reply::NotCancellable { job_id } => {
            format!("recusado: job #{job_id} is not cancellable")
        }
        Reply::Progress { transforms, jobs } => render_status(transforms, jobs),
    }
}
