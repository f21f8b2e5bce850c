use super::models::{from_unix, Exam, ExamAttempt, PaymentStatus, PurchaseOrder, Session};
use super::schema::COURSE_VERSIONED_SCHEMAS;
use super::CourseStore;
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{anyhow, Result};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, subject_id, created_at, expires_at, revoked";
const EXAM_COLUMNS: &str = "id, title, duration_minutes, end_time";
const ATTEMPT_COLUMNS: &str = "id, exam_id, subject_id, started_at, ended_at";
const PURCHASE_COLUMNS: &str = "id, subject_id, payment_status, expired_at, updated_at";

pub struct SqliteCourseStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCourseStore {
    pub fn new<P: AsRef<Path>>(db_path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = open_versioned_db(db_path.as_ref(), COURSE_VERSIONED_SCHEMAS, busy_timeout)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Course database connection mutex poisoned"))
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Reads a unix-seconds column. Values outside the representable range
    /// fail the row instead of collapsing to some default instant.
    fn timestamp_column(row: &rusqlite::Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
        let secs: i64 = row.get(column)?;
        Self::to_datetime(row, column, secs)
    }

    fn optional_timestamp_column(
        row: &rusqlite::Row,
        column: &str,
    ) -> rusqlite::Result<Option<DateTime<Utc>>> {
        row.get::<_, Option<i64>>(column)?
            .map(|secs| Self::to_datetime(row, column, secs))
            .transpose()
    }

    fn to_datetime(row: &rusqlite::Row, column: &str, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
        match from_unix(secs) {
            Some(datetime) => Ok(datetime),
            None => Err(rusqlite::Error::FromSqlConversionFailure(
                row.as_ref().column_index(column)?,
                rusqlite::types::Type::Integer,
                format!("{} = {} is not a valid unix timestamp", column, secs).into(),
            )),
        }
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
        Ok(Session {
            id: row.get("id")?,
            subject_id: row.get("subject_id")?,
            created_at: Self::timestamp_column(row, "created_at")?,
            expires_at: Self::timestamp_column(row, "expires_at")?,
            revoked: row.get::<_, i64>("revoked")? != 0,
        })
    }

    fn row_to_exam(row: &rusqlite::Row) -> rusqlite::Result<Exam> {
        Ok(Exam {
            id: row.get("id")?,
            title: row.get("title")?,
            duration_minutes: row.get("duration_minutes")?,
            end_time: Self::optional_timestamp_column(row, "end_time")?,
        })
    }

    fn row_to_attempt(row: &rusqlite::Row) -> rusqlite::Result<ExamAttempt> {
        Ok(ExamAttempt {
            id: row.get("id")?,
            exam_id: row.get("exam_id")?,
            subject_id: row.get("subject_id")?,
            started_at: Self::timestamp_column(row, "started_at")?,
            ended_at: Self::optional_timestamp_column(row, "ended_at")?,
        })
    }

    fn row_to_purchase(row: &rusqlite::Row) -> rusqlite::Result<PurchaseOrder> {
        let status_str: String = row.get("payment_status")?;
        let payment_status = PaymentStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown payment status '{}'", status_str).into(),
            )
        })?;
        Ok(PurchaseOrder {
            id: row.get("id")?,
            subject_id: row.get("subject_id")?,
            payment_status,
            expired_at: Self::optional_timestamp_column(row, "expired_at")?,
            updated_at: Self::timestamp_column(row, "updated_at")?,
        })
    }
}

impl CourseStore for SqliteCourseStore {
    fn create_session(&self, subject_id: &str, expires_at: DateTime<Utc>) -> Result<Session> {
        let session = Session {
            id: Self::new_id(),
            subject_id: subject_id.to_string(),
            created_at: Utc::now().trunc_subsecs(0),
            expires_at: expires_at.trunc_subsecs(0),
            revoked: false,
        };
        self.conn()?.execute(
            "INSERT INTO sessions (id, subject_id, created_at, expires_at, revoked) VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                session.id,
                session.subject_id,
                session.created_at.timestamp(),
                session.expires_at.timestamp()
            ],
        )?;
        Ok(session)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                params![id],
                Self::row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn revoke_session(&self, id: &str) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE sessions SET revoked = 1 WHERE id = ?1 AND revoked = 0",
            params![id],
        )?;
        Ok(changed > 0)
    }

    fn revoke_sessions_for_subject(&self, subject_id: &str) -> Result<usize> {
        let changed = self.conn()?.execute(
            "UPDATE sessions SET revoked = 1 WHERE subject_id = ?1 AND revoked = 0",
            params![subject_id],
        )?;
        Ok(changed)
    }

    fn list_reapable_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE expires_at <= ?1 OR revoked = 1",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![now.timestamp()], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn delete_session_if_reapable(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn()?.execute(
            "DELETE FROM sessions WHERE id = ?1 AND (expires_at <= ?2 OR revoked = 1)",
            params![id, now.timestamp()],
        )?;
        Ok(changed > 0)
    }

    fn create_exam(
        &self,
        title: &str,
        duration_minutes: i64,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Exam> {
        let exam = Exam {
            id: Self::new_id(),
            title: title.to_string(),
            duration_minutes,
            end_time: end_time.map(|t| t.trunc_subsecs(0)),
        };
        self.conn()?.execute(
            "INSERT INTO exams (id, title, duration_minutes, end_time) VALUES (?1, ?2, ?3, ?4)",
            params![
                exam.id,
                exam.title,
                exam.duration_minutes,
                exam.end_time.map(|t| t.timestamp())
            ],
        )?;
        Ok(exam)
    }

    fn get_exam(&self, id: &str) -> Result<Option<Exam>> {
        let conn = self.conn()?;
        let exam = conn
            .query_row(
                &format!("SELECT {} FROM exams WHERE id = ?1", EXAM_COLUMNS),
                params![id],
                Self::row_to_exam,
            )
            .optional()?;
        Ok(exam)
    }

    fn start_attempt(
        &self,
        exam_id: &str,
        subject_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt> {
        let attempt = ExamAttempt {
            id: Self::new_id(),
            exam_id: exam_id.to_string(),
            subject_id: subject_id.to_string(),
            started_at: started_at.trunc_subsecs(0),
            ended_at: None,
        };
        self.conn()?.execute(
            "INSERT INTO exam_attempts (id, exam_id, subject_id, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                attempt.id,
                attempt.exam_id,
                attempt.subject_id,
                attempt.started_at.timestamp()
            ],
        )?;
        Ok(attempt)
    }

    fn get_attempt(&self, id: &str) -> Result<Option<ExamAttempt>> {
        let conn = self.conn()?;
        let attempt = conn
            .query_row(
                &format!("SELECT {} FROM exam_attempts WHERE id = ?1", ATTEMPT_COLUMNS),
                params![id],
                Self::row_to_attempt,
            )
            .optional()?;
        Ok(attempt)
    }

    fn list_open_attempts(&self) -> Result<Vec<ExamAttempt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM exam_attempts WHERE ended_at IS NULL",
            ATTEMPT_COLUMNS
        ))?;
        let attempts = stmt
            .query_map([], Self::row_to_attempt)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attempts)
    }

    fn close_attempt_if_open(&self, id: &str, ended_at: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE exam_attempts SET ended_at = ?2 WHERE id = ?1 AND ended_at IS NULL",
            params![id, ended_at.timestamp()],
        )?;
        Ok(changed > 0)
    }

    fn create_purchase(
        &self,
        subject_id: &str,
        status: PaymentStatus,
        expired_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOrder> {
        let order = PurchaseOrder {
            id: Self::new_id(),
            subject_id: subject_id.to_string(),
            payment_status: status,
            expired_at: expired_at.map(|t| t.trunc_subsecs(0)),
            updated_at: now.trunc_subsecs(0),
        };
        self.conn()?.execute(
            "INSERT INTO purchase_orders (id, subject_id, payment_status, expired_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                order.id,
                order.subject_id,
                order.payment_status.as_str(),
                order.expired_at.map(|t| t.timestamp()),
                order.updated_at.timestamp()
            ],
        )?;
        Ok(order)
    }

    fn get_purchase(&self, id: &str) -> Result<Option<PurchaseOrder>> {
        let conn = self.conn()?;
        let order = conn
            .query_row(
                &format!("SELECT {} FROM purchase_orders WHERE id = ?1", PURCHASE_COLUMNS),
                params![id],
                Self::row_to_purchase,
            )
            .optional()?;
        Ok(order)
    }

    fn list_expirable_purchases(&self, now: DateTime<Utc>) -> Result<Vec<PurchaseOrder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM purchase_orders
             WHERE payment_status = ?1 AND expired_at IS NOT NULL AND expired_at <= ?2",
            PURCHASE_COLUMNS
        ))?;
        let orders = stmt
            .query_map(
                params![PaymentStatus::Pending.as_str(), now.timestamp()],
                Self::row_to_purchase,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    fn expire_purchase_if_pending(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE purchase_orders SET payment_status = ?2, updated_at = ?4
             WHERE id = ?1 AND payment_status = ?3 AND expired_at IS NOT NULL AND expired_at <= ?4",
            params![
                id,
                PaymentStatus::Expired.as_str(),
                PaymentStatus::Pending.as_str(),
                now.timestamp()
            ],
        )?;
        Ok(changed > 0)
    }

    fn expire_all_stale_purchases(&self, now: DateTime<Utc>) -> Result<usize> {
        let changed = self.conn()?.execute(
            "UPDATE purchase_orders SET payment_status = ?1, updated_at = ?3
             WHERE payment_status = ?2 AND expired_at IS NOT NULL AND expired_at <= ?3",
            params![
                PaymentStatus::Expired.as_str(),
                PaymentStatus::Pending.as_str(),
                now.timestamp()
            ],
        )?;
        Ok(changed)
    }

    fn confirm_payment(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE purchase_orders SET payment_status = ?2, updated_at = ?5
             WHERE id = ?1 AND payment_status IN (?3, ?4)",
            params![
                id,
                PaymentStatus::Paid.as_str(),
                PaymentStatus::Pending.as_str(),
                PaymentStatus::AwaitingConfirmation.as_str(),
                now.timestamp()
            ],
        )?;
        Ok(changed > 0)
    }
}
