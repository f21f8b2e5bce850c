//! HTTP client for end-to-end tests
//!
//! This module wraps reqwest and provides methods for all course-server
//! endpoints. When API routes change, update only this file.

use super::constants::*;
use super::server::TestServer;
use course_server::Role;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// HTTP test client carrying an optional bearer credential
#[allow(dead_code)]
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Credential sent as `Authorization: Bearer <token>`
    pub token: Option<String>,
}

#[allow(dead_code)]
impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client that presents the given raw credential
    pub fn with_token(base_url: String, token: impl Into<String>) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(token.into());
        client
    }

    /// Creates a client holding a freshly issued credential for `subject_id`
    pub fn authenticated(server: &TestServer, subject_id: &str, role: Role) -> Self {
        Self::with_token(server.base_url.clone(), server.issue_token(subject_id, role))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get(&self, path: &str) -> Response {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post(&self, path: &str) -> Response {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // Public Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.get("/").await
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// GET /v1/auth/me
    pub async fn me(&self) -> Response {
        self.get("/v1/auth/me").await
    }

    /// POST /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.post("/v1/auth/logout").await
    }

    // ========================================================================
    // Admin Job Endpoints
    // ========================================================================

    /// GET /v1/admin/jobs
    pub async fn list_jobs(&self) -> Response {
        self.get("/v1/admin/jobs").await
    }

    /// GET /v1/admin/jobs/{id}
    pub async fn get_job(&self, job_id: &str) -> Response {
        self.get(&format!("/v1/admin/jobs/{}", job_id)).await
    }

    /// POST /v1/admin/jobs/{id}/trigger
    pub async fn trigger_job(&self, job_id: &str) -> Response {
        self.post(&format!("/v1/admin/jobs/{}/trigger", job_id)).await
    }

    /// Triggers a job and polls it until the firing has been recorded.
    /// Returns the job's `last_run` object.
    ///
    /// # Panics
    ///
    /// Panics if the trigger is refused or the firing doesn't finish in time.
    pub async fn run_job(&self, job_id: &str) -> Value {
        let response = self.trigger_job(job_id).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED, "trigger {}", job_id);
        self.wait_for_last_run(job_id).await
    }

    /// Polls a job until it is idle and has a recorded firing.
    pub async fn wait_for_last_run(&self, job_id: &str) -> Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(JOB_COMPLETION_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!("Job {} did not finish within {:?}", job_id, timeout);
            }

            let response = self.get_job(job_id).await;
            assert_eq!(response.status(), StatusCode::OK);
            let job: Value = response.json().await.expect("Invalid job JSON");
            if job["is_running"] == false && !job["last_run"].is_null() {
                return job["last_run"].clone();
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    // ========================================================================
    // Exam Endpoints
    // ========================================================================

    /// POST /v1/exams/attempts/{id}/submit
    pub async fn submit_attempt(&self, attempt_id: &str) -> Response {
        self.post(&format!("/v1/exams/attempts/{}/submit", attempt_id))
            .await
    }
}
