//! The consistency jobs.
//!
//! Each firing selects its candidates, re-checks the temporal predicate for
//! every record and applies a conditional write, so a concurrent request that
//! touched the same row turns the job's write into a no-op.

pub mod purchase_expirer;
pub mod quiz_auto_submit;
pub mod session_reaper;

pub use purchase_expirer::PurchaseExpirerJob;
pub use quiz_auto_submit::QuizAutoSubmitJob;
pub use session_reaper::SessionReaperJob;

use super::job::JobError;
use tracing::error;

fn candidate_read_failed(job_id: &str, e: anyhow::Error) -> JobError {
    error!("[{}] Failed to read candidates, skipping firing: {:#}", job_id, e);
    JobError::CandidateReadFailed(e.to_string())
}
