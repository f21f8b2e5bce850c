use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info, warn};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::{log_requests, require_auth, require_role, state::*};
use crate::auth::{AuthContext, Role, RoleGate};
use crate::background_jobs::JobError;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
struct MeResponse {
    subject_id: String,
    email: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    expires_at: i64,
}

#[derive(Serialize)]
struct LogoutResponse {
    revoked_sessions: usize,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn me(auth: AuthContext) -> Json<MeResponse> {
    let claims = auth.claims;
    Json(MeResponse {
        subject_id: claims.sub,
        email: claims.email,
        role: claims.role,
        name: claims.name,
        expires_at: claims.exp,
    })
}

/// Revokes the presented credential for the rest of its lifetime and every
/// stored session of its subject.
async fn logout(auth: AuthContext, State(state): State<ServerState>) -> Response {
    if let Err(e) = state
        .revocations
        .mark_revoked_until(&auth.credential, auth.claims.exp)
        .await
    {
        error!("Failed to revoke credential of {}: {:#}", auth.subject_id(), e);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    match state.course_store.revoke_sessions_for_subject(auth.subject_id()) {
        Ok(revoked_sessions) => {
            info!(
                "Subject {} logged out, {} sessions revoked",
                auth.subject_id(),
                revoked_sessions
            );
            Json(LogoutResponse { revoked_sessions }).into_response()
        }
        Err(e) => {
            error!("Failed to revoke sessions of {}: {:#}", auth.subject_id(), e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn list_jobs(State(scheduler): State<OptionalSchedulerHandle>) -> Response {
    match scheduler {
        Some(handle) => Json(handle.list_jobs().await).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn get_job(
    State(scheduler): State<OptionalSchedulerHandle>,
    Path(job_id): Path<String>,
) -> Response {
    let Some(handle) = scheduler else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    match handle.get_job(&job_id).await {
        Some(job) => Json(job).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn trigger_job(
    auth: AuthContext,
    State(scheduler): State<OptionalSchedulerHandle>,
    Path(job_id): Path<String>,
) -> Response {
    let Some(handle) = scheduler else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    match handle.trigger_job(&job_id).await {
        Ok(()) => {
            info!("Job {} triggered by {}", job_id, auth.subject_id());
            StatusCode::ACCEPTED.into_response()
        }
        Err(JobError::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(JobError::AlreadyRunning) => StatusCode::CONFLICT.into_response(),
        Err(e) => {
            warn!("Could not trigger job {}: {}", job_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Explicit submission. Uses the same conditional close as the auto-submit
/// job, so whichever lands first wins and the other sees a conflict.
async fn submit_attempt(
    auth: AuthContext,
    State(store): State<GuardedCourseStore>,
    Path(attempt_id): Path<String>,
) -> Response {
    let attempt = match store.get_attempt(&attempt_id) {
        Ok(Some(attempt)) if attempt.subject_id == auth.subject_id() => attempt,
        Ok(_) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!("Failed to load attempt {}: {:#}", attempt_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match store.close_attempt_if_open(&attempt.id, Utc::now()) {
        Ok(true) => match store.get_attempt(&attempt.id) {
            Ok(Some(closed)) => Json(closed).into_response(),
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(e) => {
                error!("Failed to reload attempt {}: {:#}", attempt.id, e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Ok(false) => StatusCode::CONFLICT.into_response(),
        Err(e) => {
            error!("Failed to submit attempt {}: {:#}", attempt.id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let require_admin = RoleGate::new([Role::Admin]);
    let require_student = RoleGate::new([Role::Student]);

    let auth_routes: Router = Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(
            state.auth_gate.clone(),
            require_auth,
        ))
        .with_state(state.clone());

    let admin_routes: Router = Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/trigger", post(trigger_job))
        .route_layer(middleware::from_fn_with_state(require_admin, require_role))
        .route_layer(middleware::from_fn_with_state(
            state.auth_gate.clone(),
            require_auth,
        ))
        .with_state(state.clone());

    let exam_routes: Router = Router::new()
        .route("/attempts/{id}/submit", post(submit_attempt))
        .route_layer(middleware::from_fn_with_state(require_student, require_role))
        .route_layer(middleware::from_fn_with_state(
            state.auth_gate.clone(),
            require_auth,
        ))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/admin", admin_routes)
        .nest("/v1/exams", exam_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
