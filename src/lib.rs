//! Course Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod auth;
pub mod background_jobs;
pub mod config;
pub mod course_store;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use auth::{AuthGate, CredentialCodec, RevocationStore, Role, RoleGate};
pub use background_jobs::{create_scheduler, BackgroundJob, JobScheduler, SchedulerHandle};
pub use course_store::{CourseStore, SqliteCourseStore};
pub use server::{make_app, run_server, RequestsLoggingLevel};
