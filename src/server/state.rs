use axum::extract::FromRef;

use crate::auth::{AuthGate, CredentialCodec, RevocationStore};
use crate::background_jobs::SchedulerHandle;
use crate::course_store::CourseStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCourseStore = Arc<dyn CourseStore>;
pub type GuardedAuthGate = Arc<AuthGate>;
pub type GuardedRevocationStore = Arc<dyn RevocationStore>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub course_store: GuardedCourseStore,
    pub session_codec: Arc<CredentialCodec>,
    pub revocations: GuardedRevocationStore,
    pub auth_gate: GuardedAuthGate,
    pub scheduler_handle: OptionalSchedulerHandle,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        course_store: GuardedCourseStore,
        session_codec: Arc<CredentialCodec>,
        revocations: GuardedRevocationStore,
        scheduler_handle: OptionalSchedulerHandle,
    ) -> Self {
        let auth_gate = Arc::new(AuthGate::new(
            session_codec.clone(),
            revocations.clone(),
        ));
        Self {
            config,
            start_time: Instant::now(),
            hash: env!("BUILD_HASH").to_string(),
            course_store,
            session_codec,
            revocations,
            auth_gate,
            scheduler_handle,
        }
    }
}

impl FromRef<ServerState> for GuardedCourseStore {
    fn from_ref(input: &ServerState) -> Self {
        input.course_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthGate {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_gate.clone()
    }
}

impl FromRef<ServerState> for GuardedRevocationStore {
    fn from_ref(input: &ServerState) -> Self {
        input.revocations.clone()
    }
}

impl FromRef<ServerState> for OptionalSchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
