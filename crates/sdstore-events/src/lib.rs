//! # sdstore-events
//!
//! The scheduler event channel: `JobSubmitted`/`JobFinished`/`JobCancelled`/
//! `Shutdown` notifications that let the control plane and runner tasks
//! trigger an admission pass without holding a reference to the scheduler.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod bus;

pub use bus::{channel, SchedulerClosed, SchedulerEvent, SchedulerEventReceiver, SchedulerEventSender};
