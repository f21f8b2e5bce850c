use serde::Serialize;
use tracing::warn;

/// What happened to a single candidate record during a firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The state transition was written.
    Applied,
    /// Nothing was written: the predicate did not hold when re-checked, or
    /// the conditional write matched no row because a concurrent writer won.
    NoOp,
    /// The record was left alone, e.g. because a lookup it depends on failed.
    Skipped { reason: String },
    /// The write itself errored.
    Failed { reason: String },
}

impl RecordOutcome {
    pub fn from_write(result: anyhow::Result<bool>) -> Self {
        match result {
            Ok(true) => RecordOutcome::Applied,
            Ok(false) => RecordOutcome::NoOp,
            Err(e) => RecordOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Aggregate of the per-record outcomes of one firing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub candidates: usize,
    pub applied: usize,
    pub no_op: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn with_candidates(candidates: usize) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    /// Counts `outcome` for `record_id`, logging anything that did not apply
    /// cleanly.
    pub fn record(&mut self, job_id: &str, record_id: &str, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Applied => self.applied += 1,
            RecordOutcome::NoOp => self.no_op += 1,
            RecordOutcome::Skipped { reason } => {
                warn!("[{}] Skipped record {}: {}", job_id, record_id, reason);
                self.skipped += 1;
            }
            RecordOutcome::Failed { reason } => {
                warn!("[{}] Failed on record {}: {}", job_id, record_id, reason);
                self.failed += 1;
            }
        }
    }
}

impl std::fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} candidates: {} applied, {} no-op, {} skipped, {} failed",
            self.candidates, self.applied, self.no_op, self.skipped, self.failed
        )
    }
}
