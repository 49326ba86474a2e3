//! The event channel that lets runner tasks and the control plane notify
//! the scheduler without holding a back-pointer to it.
//!
//! `Finished` must be observed by exactly one scheduler task, never fanned
//! out to multiple subscribers, so this is an `mpsc` channel with a single
//! receiver and cheaply cloneable senders — one per client connection and
//! one per runner task.

use tokio::sync::mpsc;

use sdstore_core::JobId;

/// An event the scheduler reacts to with one admission pass over the
/// pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A new job was enqueued as `Pending`.
    Submitted(JobId),
    /// A running job reached a terminal state and released its slots.
    Finished(JobId),
    /// A pending job was cancelled before admission.
    Cancelled(JobId),
    /// The daemon is shutting down: admit nothing further.
    Shutdown,
}

/// The sending half of the scheduler event channel. Cheap to clone; every
/// control-plane connection task and every runner task holds one.
#[derive(Debug, Clone)]
pub struct SchedulerEventSender {
    inner: mpsc::UnboundedSender<SchedulerEvent>,
}

/// The error returned by every `SchedulerEventSender` method when the
/// scheduler task has already shut down and dropped its receiver.
#[derive(Debug, thiserror::Error)]
#[error("scheduler event channel closed")]
pub struct SchedulerClosed;

impl SchedulerEventSender {
    fn send(&self, event: SchedulerEvent) -> Result<(), SchedulerClosed> {
        self.inner.send(event).map_err(|_| SchedulerClosed)
    }

    /// Notifies the scheduler a new job was enqueued.
    pub fn submitted(&self, job_id: JobId) -> Result<(), SchedulerClosed> {
        self.send(SchedulerEvent::Submitted(job_id))
    }

    /// Notifies the scheduler a running job has finished (in any terminal
    /// state) and its slots have already been released.
    pub fn finished(&self, job_id: JobId) -> Result<(), SchedulerClosed> {
        self.send(SchedulerEvent::Finished(job_id))
    }

    /// Notifies the scheduler a pending job was cancelled.
    pub fn cancelled(&self, job_id: JobId) -> Result<(), SchedulerClosed> {
        self.send(SchedulerEvent::Cancelled(job_id))
    }

    /// Requests an orderly shutdown.
    pub fn shutdown(&self) -> Result<(), SchedulerClosed> {
        self.send(SchedulerEvent::Shutdown)
    }
}

/// The receiving half, owned exclusively by the scheduler task.
#[derive(Debug)]
pub struct SchedulerEventReceiver {
    inner: mpsc::UnboundedReceiver<SchedulerEvent>,
}

impl SchedulerEventReceiver {
    /// Awaits the next event. Returns `None` once every sender has dropped.
    pub async fn recv(&mut self) -> Option<SchedulerEvent> {
        self.inner.recv().await
    }
}

/// Creates a fresh scheduler event channel.
#[must_use]
pub fn channel() -> (SchedulerEventSender, SchedulerEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        SchedulerEventSender { inner: tx },
        SchedulerEventReceiver { inner: rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (tx, mut rx) = channel();
        tx.submitted(JobId(1)).unwrap();
        tx.finished(JobId(1)).unwrap();

        assert_eq!(rx.recv().await, Some(SchedulerEvent::Submitted(JobId(1))));
        assert_eq!(rx.recv().await, Some(SchedulerEvent::Finished(JobId(1))));
    }

    #[tokio::test]
    async fn closed_channel_is_reported_on_send() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(tx.submitted(JobId(1)).is_err());
    }

    #[tokio::test]
    async fn senders_are_cloneable_across_tasks() {
        let (tx, mut rx) = channel();
        let tx2 = tx.clone();
        tokio::spawn(async move {
            tx2.finished(JobId(42)).unwrap();
        })
        .await
        .unwrap();

        assert_eq!(rx.recv().await, Some(SchedulerEvent::Finished(JobId(42))));
    }
}
