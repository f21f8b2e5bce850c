use super::job::{BackgroundJob, JobError};
use super::outcome::BatchOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Information about a registered job for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub interval_secs: u64,
    pub is_running: bool,
    pub last_run: Option<JobRunInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Serializable record of the most recent firing of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunInfo {
    pub started_at: String,
    pub finished_at: String,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    pub triggered_by: String,
    pub outcome: Option<BatchOutcome>,
}

impl JobRunInfo {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        result: &Result<BatchOutcome, JobError>,
        triggered_by: &str,
    ) -> Self {
        let (status, error_message, outcome) = match result {
            Ok(outcome) => (JobRunStatus::Completed, None, Some(outcome.clone())),
            Err(JobError::Cancelled) => (JobRunStatus::Cancelled, None, None),
            Err(e) => (JobRunStatus::Failed, Some(e.to_string()), None),
        };
        Self {
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            status,
            error_message,
            triggered_by: triggered_by.to_string(),
            outcome,
        }
    }
}

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    TriggerJob {
        job_id: String,
        response: oneshot::Sender<Result<(), JobError>>,
    },
}

/// Shared state between scheduler, timer tasks and handle.
#[derive(Default)]
pub struct SharedJobState {
    /// Static job info (set at registration, never changes)
    pub jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    /// Single-flight guard: ids of jobs with a firing in progress.
    pub running_jobs: HashSet<String>,
    pub last_runs: HashMap<String, JobRunInfo>,
}

impl SharedJobState {
    fn job_info(&self, job_id: &str) -> Option<JobInfo> {
        let job = self.jobs.get(job_id)?;
        Some(JobInfo {
            id: job_id.to_string(),
            name: job.name().to_string(),
            description: job.description().to_string(),
            interval_secs: job.interval().as_secs(),
            is_running: self.running_jobs.contains(job_id),
            last_run: self.last_runs.get(job_id).cloned(),
        })
    }
}

/// Handle to interact with the job scheduler from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
        }
    }

    /// Get information about all registered jobs, sorted by id.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let state = self.shared_state.read().await;
        let mut jobs: Vec<JobInfo> = state
            .jobs
            .keys()
            .filter_map(|job_id| state.job_info(job_id))
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn get_job(&self, job_id: &str) -> Option<JobInfo> {
        self.shared_state.read().await.job_info(job_id)
    }

    /// Trigger a job manually. Goes through the same single-flight guard as
    /// timer firings.
    pub async fn trigger_job(&self, job_id: &str) -> Result<(), JobError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerJob {
                job_id: job_id.to_string(),
                response: response_tx,
            })
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler not available".to_string()))?;

        response_rx
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler did not respond".to_string()))?
    }

    pub async fn is_job_running(&self, job_id: &str) -> bool {
        self.shared_state.read().await.running_jobs.contains(job_id)
    }

    pub async fn job_exists(&self, job_id: &str) -> bool {
        self.shared_state.read().await.jobs.contains_key(job_id)
    }

    /// The most recent finished firing of a job, if any.
    pub async fn last_outcome(&self, job_id: &str) -> Option<JobRunInfo> {
        self.shared_state.read().await.last_runs.get(job_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_info_from_completed_firing() {
        let now = Utc::now();
        let outcome = BatchOutcome {
            candidates: 2,
            applied: 2,
            ..Default::default()
        };
        let info = JobRunInfo::new(now, now, &Ok(outcome.clone()), "schedule");

        assert_eq!(info.status, JobRunStatus::Completed);
        assert!(info.error_message.is_none());
        assert_eq!(info.outcome, Some(outcome));
        assert_eq!(info.triggered_by, "schedule");
    }

    #[test]
    fn run_info_from_failed_firing() {
        let now = Utc::now();
        let info = JobRunInfo::new(
            now,
            now + chrono::Duration::seconds(5),
            &Err(JobError::CandidateReadFailed("database is locked".to_string())),
            "manual",
        );

        assert_eq!(info.status, JobRunStatus::Failed);
        assert_eq!(
            info.error_message.as_deref(),
            Some("Failed to read candidates: database is locked")
        );
        assert!(info.outcome.is_none());
    }

    #[test]
    fn run_info_from_cancelled_firing() {
        let now = Utc::now();
        let info = JobRunInfo::new(now, now, &Err(JobError::Cancelled), "schedule");
        assert_eq!(info.status, JobRunStatus::Cancelled);
        assert!(info.error_message.is_none());
    }

    #[test]
    fn run_info_serializes_status_lowercase() {
        let now = Utc::now();
        let info = JobRunInfo::new(now, now, &Ok(BatchOutcome::default()), "manual");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json["started_at"].as_str().unwrap().contains('T'));
        assert_eq!(json["outcome"]["applied"], 0);
    }
}
