//! Background execution of prime jobs.
//!
//! [`JobScheduler`] runs jobs submitted in-process; [`QueuedJobPoller`]
//! feeds it jobs that are queued in the store without a live submission.

pub mod config;
pub mod poller;
pub mod scheduler;
pub mod telemetry;

pub use config::{PollerConfig, SchedulerConfig};
pub use poller::QueuedJobPoller;
pub use scheduler::{JobOutcome, JobScheduler, SchedulerError};
