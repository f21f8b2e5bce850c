//! Quiz auto-submit background job.
//!
//! Closes open exam attempts whose time window has elapsed. An attempt's
//! deadline is its start plus the exam duration, capped by the exam's hard end
//! time when one is set. Start times are stored at whole-second precision, so
//! the comparison against the current time happens at that precision too.

use super::candidate_read_failed;
use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
    outcome::{BatchOutcome, RecordOutcome},
};
use crate::course_store::{CourseStore, ExamAttempt};
use chrono::{DateTime, SubsecRound, Utc};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

pub struct QuizAutoSubmitJob {
    interval: Duration,
}

impl QuizAutoSubmitJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn run_at(
        &self,
        store: &dyn CourseStore,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, JobError> {
        let candidates = store
            .list_open_attempts()
            .map_err(|e| candidate_read_failed(self.id(), e))?;
        debug!("Checking {} open exam attempts", candidates.len());

        let mut outcome = BatchOutcome::with_candidates(candidates.len());
        for attempt in candidates {
            let record = Self::settle(store, &attempt, now);
            outcome.record(self.id(), &attempt.id, record);
        }
        Ok(outcome)
    }

    fn settle(store: &dyn CourseStore, attempt: &ExamAttempt, now: DateTime<Utc>) -> RecordOutcome {
        let exam = match store.get_exam(&attempt.exam_id) {
            Ok(Some(exam)) => exam,
            Ok(None) => {
                return RecordOutcome::Skipped {
                    reason: format!("exam {} not found", attempt.exam_id),
                }
            }
            Err(e) => {
                return RecordOutcome::Skipped {
                    reason: format!("exam {} lookup failed: {}", attempt.exam_id, e),
                }
            }
        };

        let Some(deadline) = exam.deadline_for(attempt.started_at) else {
            return RecordOutcome::Skipped {
                reason: format!(
                    "exam {} deadline out of range ({} minutes)",
                    exam.id, exam.duration_minutes
                ),
            };
        };
        let now = now.trunc_subsecs(0);
        if now <= deadline {
            return RecordOutcome::NoOp;
        }
        RecordOutcome::from_write(store.close_attempt_if_open(&attempt.id, now))
    }
}

impl Default for QuizAutoSubmitJob {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl BackgroundJob for QuizAutoSubmitJob {
    fn id(&self) -> &'static str {
        "quiz_auto_submit"
    }

    fn name(&self) -> &'static str {
        "Quiz Auto-Submit"
    }

    fn description(&self) -> &'static str {
        "Close open exam attempts whose time window has elapsed"
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
