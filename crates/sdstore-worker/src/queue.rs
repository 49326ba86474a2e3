//! The pending queue (owned by the scheduler): jobs waiting on admission,
//! ordered highest priority first, FIFO within a priority tier.

use std::collections::BinaryHeap;

use sdstore_core::{JobId, Priority};

/// An ordering key for one pending job. The full `JobRecord` stays in the
/// job store; the queue only needs enough to decide admission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub priority: Priority,
    pub job_id: JobId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap: higher priority must compare greater so
        // it surfaces first. Within equal priority, the *lower* job id
        // (submitted earlier) must compare greater, giving FIFO order.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.job_id.cmp(&self.job_id))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The pending queue. Not thread-safe by itself — owned exclusively by the
/// scheduler task.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: BinaryHeap<QueueEntry>,
}

impl PendingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: Priority, job_id: JobId) {
        self.entries.push(QueueEntry { priority, job_id });
    }

    /// Removes a specific job (used by `Cancel` on a still-`Pending` job).
    /// Returns `true` if it was present.
    pub fn remove(&mut self, job_id: JobId) -> bool {
        let before = self.entries.len();
        self.entries = self.entries.drain().filter(|e| e.job_id != job_id).collect();
        self.entries.len() != before
    }

    /// The head-of-line admission order: highest priority first, FIFO
    /// within a tier. Non-destructive — the scheduler removes admitted
    /// jobs explicitly via `remove`.
    #[must_use]
    pub fn admission_order(&self) -> Vec<QueueEntry> {
        let mut sorted: Vec<QueueEntry> = self.entries.iter().copied().collect();
        sorted.sort_by(|a, b| b.cmp(a));
        sorted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_order_is_priority_then_fifo() {
        let mut queue = PendingQueue::new();
        queue.push(Priority(0), JobId(1));
        queue.push(Priority(1), JobId(2));
        queue.push(Priority(0), JobId(3));
        queue.push(Priority(1), JobId(4));

        let order: Vec<JobId> = queue.admission_order().into_iter().map(|e| e.job_id).collect();
        assert_eq!(order, vec![JobId(2), JobId(4), JobId(1), JobId(3)]);
    }

    #[test]
    fn remove_drops_a_pending_job() {
        let mut queue = PendingQueue::new();
        queue.push(Priority(0), JobId(1));
        queue.push(Priority(0), JobId(2));

        assert!(queue.remove(JobId(1)));
        assert!(!queue.remove(JobId(1)), "already removed");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.admission_order()[0].job_id, JobId(2));
    }
}
