use super::context::JobContext;
use super::outcome::BatchOutcome;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during job execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Job not found")]
    NotFound,
    #[error("Job is already running")]
    AlreadyRunning,
    /// The candidate set could not be read; the firing was skipped as a whole.
    #[error("Failed to read candidates: {0}")]
    CandidateReadFailed(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Job was cancelled")]
    Cancelled,
}

/// Trait for background jobs.
///
/// Jobs are executed synchronously in a blocking context.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Fixed period between two firings. Always positive.
    fn interval(&self) -> Duration;

    /// Execute one firing.
    ///
    /// Per-record failures are folded into the returned [`BatchOutcome`]; only
    /// a failure that prevents the firing from starting is an `Err`.
    fn execute(&self, ctx: &JobContext) -> Result<BatchOutcome, JobError>;
}
