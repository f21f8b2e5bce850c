//! Purchase expirer background job.
//!
//! Flips pending purchase orders whose payment window has passed to
//! `expired`. The transition is one conditional update per order, so a
//! payment confirmation that commits first always wins.

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

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10 * 60);

pub struct PurchaseExpirerJob {
    interval: Duration,
}

impl PurchaseExpirerJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn run_at(
        &self,
        store: &dyn CourseStore,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, JobError> {
        let candidates = store
            .list_expirable_purchases(now)
            .map_err(|e| candidate_read_failed(self.id(), e))?;

        if candidates.is_empty() {
            debug!("No purchase orders to expire");
            return Ok(BatchOutcome::default());
        }
        info!("Expiring {} stale pending purchase orders", candidates.len());

        let mut outcome = BatchOutcome::with_candidates(candidates.len());
        for order in candidates {
            let result = store.expire_purchase_if_pending(&order.id, now);
            outcome.record(self.id(), &order.id, RecordOutcome::from_write(result));
        }
        Ok(outcome)
    }
}

impl Default for PurchaseExpirerJob {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl BackgroundJob for PurchaseExpirerJob {
    fn id(&self) -> &'static str {
        "purchase_expirer"
    }

    fn name(&self) -> &'static str {
        "Purchase Expirer"
    }

    fn description(&self) -> &'static str {
        "Mark pending purchase orders past their payment deadline as expired"
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
