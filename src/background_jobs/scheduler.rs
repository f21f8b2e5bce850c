use super::context::JobContext;
use super::handle::{JobRunInfo, SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, JobError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Starts firings, enforcing at most one in-flight firing per job id.
#[derive(Clone)]
struct JobLauncher {
    shared_state: Arc<RwLock<SharedJobState>>,
    job_context: JobContext,
    tracker: TaskTracker,
}

impl JobLauncher {
    async fn launch(&self, job_id: &str, triggered_by: &'static str) -> Result<(), JobError> {
        let job = {
            let mut state = self.shared_state.write().await;
            let job = state.jobs.get(job_id).cloned().ok_or(JobError::NotFound)?;
            if !state.running_jobs.insert(job_id.to_string()) {
                return Err(JobError::AlreadyRunning);
            }
            job
        };

        info!("Starting job: {} (triggered_by: {})", job_id, triggered_by);

        let ctx = self.job_context.clone();
        let shared_state = Arc::clone(&self.shared_state);
        let job_id_owned = job_id.to_string();

        self.tracker.spawn(async move {
            let started_at = Utc::now();
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx))
                .await
                .unwrap_or_else(|e| Err(JobError::ExecutionFailed(format!("Task panic: {}", e))));
            let elapsed = start_time.elapsed();

            match &result {
                Ok(outcome) => info!("Job {} completed in {:?}: {}", job_id_owned, elapsed, outcome),
                Err(JobError::Cancelled) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed)
                }
                Err(e) => error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e),
            }

            let run = JobRunInfo::new(started_at, Utc::now(), &result, triggered_by);
            let mut state = shared_state.write().await;
            state.running_jobs.remove(&job_id_owned);
            state.last_runs.insert(job_id_owned, run);
        });

        Ok(())
    }
}

/// Manages background job scheduling and execution.
///
/// Every registered job gets its own timer task, so one job's cadence or
/// failures never delay another. Manual triggers arrive through the command
/// channel owned by [`SchedulerHandle`].
pub struct JobScheduler {
    launcher: JobLauncher,

    /// Receiver for commands from SchedulerHandle
    command_receiver: mpsc::Receiver<SchedulerCommand>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,
}

impl JobScheduler {
    pub fn new(
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            launcher: JobLauncher {
                shared_state,
                job_context,
                tracker: TaskTracker::new(),
            },
            command_receiver,
            shutdown_token,
        }
    }

    /// Register a job with the scheduler. Jobs registered after [`Self::run`]
    /// has started get no timer.
    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        let mut state = self.launcher.shared_state.write().await;
        state.jobs.insert(job_id, job);
    }

    pub async fn job_count(&self) -> usize {
        self.launcher.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop. Returns once the shutdown token is cancelled and
    /// in-flight firings have finished.
    pub async fn run(&mut self) {
        let schedules: Vec<(String, Duration)> = {
            let state = self.launcher.shared_state.read().await;
            state
                .jobs
                .iter()
                .map(|(job_id, job)| (job_id.clone(), job.interval()))
                .collect()
        };
        info!("Starting job scheduler with {} registered jobs", schedules.len());

        for (job_id, interval) in schedules {
            self.spawn_timer(job_id, interval);
        }

        loop {
            tokio::select! {
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn spawn_timer(&self, job_id: String, interval: Duration) {
        info!("Scheduling job {} every {:?}", job_id, interval);
        let launcher = self.launcher.clone();
        let shutdown_token = self.shutdown_token.clone();

        self.launcher.tracker.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    _ = ticker.tick() => {
                        match launcher.launch(&job_id, "schedule").await {
                            Ok(()) => {}
                            Err(JobError::AlreadyRunning) => {
                                debug!("Skipping firing of {}: previous firing still running", job_id);
                            }
                            Err(e) => warn!("Could not fire job {}: {}", job_id, e),
                        }
                    }
                }
            }
            debug!("Timer for job {} stopped", job_id);
        });
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerJob { job_id, response } => {
                let result = self.launcher.launch(&job_id, "manual").await;
                let _ = response.send(result);
            }
        }
    }

    /// Stops the timers and waits for in-flight firings. Firings are not
    /// aborted.
    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");
        let tracker = &self.launcher.tracker;
        tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait()).await.is_err() {
            warn!(
                "Timed out after {:?} waiting for {} running tasks",
                SHUTDOWN_GRACE,
                tracker.len()
            );
        }
        info!("Scheduler shutdown complete");
    }
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    shutdown_token: CancellationToken,
    job_context: JobContext,
) -> (JobScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedJobState::default()));

    let scheduler = JobScheduler::new(
        command_rx,
        shutdown_token,
        job_context,
        Arc::clone(&shared_state),
    );
    let handle = SchedulerHandle::new(command_tx, shared_state);

    (scheduler, handle)
}
