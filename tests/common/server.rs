//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database, revocation list
//! and job scheduler.

use super::constants::*;
use super::fixtures::Fixtures;
use course_server::auth::{
    CredentialCodec, CredentialCodecs, InMemoryRevocationStore, Role, SessionClaims,
};
use course_server::background_jobs::{
    create_scheduler,
    jobs::{PurchaseExpirerJob, QuizAutoSubmitJob, SessionReaperJob},
    JobContext, SchedulerHandle,
};
use course_server::config::BackgroundJobsSettings;
use course_server::course_store::{CourseStore, SqliteCourseStore};
use course_server::server::{make_app, state::ServerState, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with an isolated database
///
/// When dropped, the server and its scheduler shut down and temp resources
/// are cleaned up.
#[allow(dead_code)]
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Course store for direct database access in tests
    pub store: Arc<dyn CourseStore>,

    /// Revocation list shared with the server's auth gate
    pub revocations: Arc<InMemoryRevocationStore>,

    pub codecs: CredentialCodecs,

    pub scheduler: SchedulerHandle,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    shutdown_token: CancellationToken,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Spawns a new test server on a random port with default job intervals.
    ///
    /// Default intervals are long enough that no timer fires during a test,
    /// so jobs only run when triggered.
    pub async fn spawn() -> Self {
        Self::spawn_with_jobs(BackgroundJobsSettings::default()).await
    }

    /// Spawns a new test server whose jobs fire on the given intervals.
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound or
    /// the server doesn't become ready within timeout.
    pub async fn spawn_with_jobs(jobs: BackgroundJobsSettings) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store: Arc<dyn CourseStore> = Arc::new(
            SqliteCourseStore::new(temp_db_dir.path().join("course.db"), Duration::from_secs(5))
                .expect("Failed to open course store"),
        );

        let revocations = Arc::new(InMemoryRevocationStore::new());
        let codecs = CredentialCodecs {
            session: Arc::new(
                CredentialCodec::new(SESSION_SECRET, chrono::Duration::hours(1))
                    .expect("Failed to create session codec"),
            ),
            verification: Arc::new(
                CredentialCodec::new(VERIFICATION_SECRET, chrono::Duration::minutes(15))
                    .expect("Failed to create verification codec"),
            ),
        };

        let shutdown_token = CancellationToken::new();
        let (mut scheduler, scheduler_handle) = create_scheduler(
            shutdown_token.clone(),
            JobContext::new(shutdown_token.child_token(), store.clone()),
        );
        scheduler
            .register_job(Arc::new(SessionReaperJob::new(jobs.session_reaper_interval)))
            .await;
        scheduler
            .register_job(Arc::new(PurchaseExpirerJob::new(
                jobs.purchase_expirer_interval,
            )))
            .await;
        scheduler
            .register_job(Arc::new(QuizAutoSubmitJob::new(
                jobs.quiz_auto_submit_interval,
            )))
            .await;
        tokio::spawn(async move { scheduler.run().await });

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
        };
        let state = ServerState::new(
            config,
            store.clone(),
            codecs.session.clone(),
            revocations.clone(),
            Some(scheduler_handle.clone()),
        );
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            store,
            revocations,
            codecs,
            scheduler: scheduler_handle,
            _temp_db_dir: temp_db_dir,
            shutdown_token,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn fixtures(&self) -> Fixtures {
        Fixtures::new(self.store.clone())
    }

    /// Issues a session credential for `subject_id` signed with the server's key.
    pub fn issue_token(&self, subject_id: &str, role: Role) -> String {
        self.codecs
            .session
            .issue(SessionClaims::new(
                subject_id,
                format!("{}@example.com", subject_id),
                role,
                None,
            ))
            .expect("Failed to issue credential")
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await,
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
