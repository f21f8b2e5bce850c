use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A login session. Live iff it is neither expired nor revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub subject_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exam {
    pub id: String,
    pub title: String,
    pub duration_minutes: i64,
    /// Wall-clock cutoff shared by every attempt.
    pub end_time: Option<DateTime<Utc>>,
}

impl Exam {
    /// Deadline for an attempt started at `started_at`.
    ///
    /// The hard end time always caps the duration-based deadline, so a late
    /// starter never gets past the exam cutoff. `None` when the duration
    /// pushes the deadline outside the representable range.
    pub fn deadline_for(&self, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let nominal = Duration::try_minutes(self.duration_minutes)
            .and_then(|duration| started_at.checked_add_signed(duration))?;
        Some(match self.end_time {
            Some(end_time) => nominal.min(end_time),
            None => nominal,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamAttempt {
    pub id: String,
    pub exam_id: String,
    pub subject_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExamAttempt {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    AwaitingConfirmation,
    Paid,
    Rejected,
    Expired,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::AwaitingConfirmation => "awaiting_confirmation",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "awaiting_confirmation" => Some(PaymentStatus::AwaitingConfirmation),
            "paid" => Some(PaymentStatus::Paid),
            "rejected" => Some(PaymentStatus::Rejected),
            "expired" => Some(PaymentStatus::Expired),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrder {
    pub id: String,
    pub subject_id: String,
    pub payment_status: PaymentStatus,
    pub expired_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn is_expirable(&self, now: DateTime<Utc>) -> bool {
        self.payment_status == PaymentStatus::Pending
            && self.expired_at.is_some_and(|expired_at| expired_at <= now)
    }
}

pub(crate) fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
