//! Background job scheduling and execution system.
//!
//! This module runs the periodic consistency jobs that enforce time bounds on
//! sessions, purchase orders and exam attempts without any client request
//! triggering them.

mod context;
mod handle;
mod job;
pub mod jobs;
mod outcome;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobInfo, JobRunInfo, JobRunStatus, SchedulerHandle};
pub use job::{BackgroundJob, JobError};
pub use outcome::{BatchOutcome, RecordOutcome};
pub use scheduler::{create_scheduler, JobScheduler};
