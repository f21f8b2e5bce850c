//! Session reaper background job.
//!
//! Deletes login sessions that have expired or were revoked.

use super::candidate_read_failed;
use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
    outcome::{BatchOutcome, RecordOutcome},
};
use crate::course_store::CourseStore;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct SessionReaperJob {
    interval: Duration,
}

impl SessionReaperJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// One firing evaluated at `now`.
    pub fn run_at(
        &self,
        store: &dyn CourseStore,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, JobError> {
        let candidates = store
            .list_reapable_sessions(now)
            .map_err(|e| candidate_read_failed(self.id(), e))?;

        if candidates.is_empty() {
            debug!("No sessions to reap");
            return Ok(BatchOutcome::default());
        }
        info!("Reaping {} expired or revoked sessions", candidates.len());

        let mut outcome = BatchOutcome::with_candidates(candidates.len());
        for session in candidates {
            // The delete re-checks the predicate; a session extended in the
            // meantime survives.
            let result = store.delete_session_if_reapable(&session.id, now);
            outcome.record(self.id(), &session.id, RecordOutcome::from_write(result));
        }
        Ok(outcome)
    }
}

impl Default for SessionReaperJob {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl BackgroundJob for SessionReaperJob {
    fn id(&self) -> &'static str {
        "session_reaper"
    }

    fn name(&self) -> &'static str {
        "Session Reaper"
    }

    fn description(&self) -> &'static str {
        "Delete login sessions that have expired or were revoked"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self, ctx: &JobContext) -> Result<BatchOutcome, JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        self.run_at(ctx.course_store.as_ref(), Utc::now())
    }
}
