mod models;
mod schema;
mod sqlite_course_store;

pub use models::*;
pub use schema::COURSE_VERSIONED_SCHEMAS;
pub use sqlite_course_store::SqliteCourseStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Transactional store shared by request handlers and background jobs.
///
/// Every state transition is a single conditional statement that re-checks its
/// precondition, returning `true` only when a row actually changed. A `false`
/// means a concurrent writer got there first.
pub trait CourseStore: Send + Sync {
    // Sessions
    fn create_session(&self, subject_id: &str, expires_at: DateTime<Utc>) -> Result<Session>;
    fn get_session(&self, id: &str) -> Result<Option<Session>>;
    fn revoke_session(&self, id: &str) -> Result<bool>;
    fn revoke_sessions_for_subject(&self, subject_id: &str) -> Result<usize>;
    fn list_reapable_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Session>>;
    /// Deletes the session only if it is still expired or revoked at `now`.
    fn delete_session_if_reapable(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;

    // Exams and attempts
    fn create_exam(
        &self,
        title: &str,
        duration_minutes: i64,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Exam>;
    fn get_exam(&self, id: &str) -> Result<Option<Exam>>;
    fn start_attempt(
        &self,
        exam_id: &str,
        subject_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt>;
    fn get_attempt(&self, id: &str) -> Result<Option<ExamAttempt>>;
    fn list_open_attempts(&self) -> Result<Vec<ExamAttempt>>;
    /// Sets `ended_at` only if the attempt is still open.
    fn close_attempt_if_open(&self, id: &str, ended_at: DateTime<Utc>) -> Result<bool>;

    // Purchases
    fn create_purchase(
        &self,
        subject_id: &str,
        status: PaymentStatus,
        expired_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOrder>;
    fn get_purchase(&self, id: &str) -> Result<Option<PurchaseOrder>>;
    fn list_expirable_purchases(&self, now: DateTime<Utc>) -> Result<Vec<PurchaseOrder>>;
    /// Moves a pending order past its expiry to `expired`; no-op otherwise.
    fn expire_purchase_if_pending(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;
    /// Bulk form of [`CourseStore::expire_purchase_if_pending`] in one statement.
    fn expire_all_stale_purchases(&self, now: DateTime<Utc>) -> Result<usize>;
    /// Marks a pending or awaiting-confirmation order as paid.
    fn confirm_payment(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;
}
