//! Seed data for end-to-end tests
//!
//! Rows are inserted straight into the course store, with timestamps
//! relative to the moment the fixture is created.

use chrono::{Duration, Utc};
use course_server::course_store::{
    CourseStore, ExamAttempt, PaymentStatus, PurchaseOrder, Session,
};
use std::sync::Arc;

/// Thin wrapper around the store handed out by [`super::TestServer`].
pub struct Fixtures {
    store: Arc<dyn CourseStore>,
}

#[allow(dead_code)]
impl Fixtures {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }

    /// A session whose expiry is already in the past.
    pub fn expired_session(&self, subject_id: &str) -> Session {
        self.store
            .create_session(subject_id, Utc::now() - Duration::minutes(5))
            .expect("Failed to create expired session")
    }

    /// A session that is still valid for an hour.
    pub fn live_session(&self, subject_id: &str) -> Session {
        self.store
            .create_session(subject_id, Utc::now() + Duration::hours(1))
            .expect("Failed to create live session")
    }

    /// A pending order whose payment window closed ten minutes ago.
    pub fn stale_pending_purchase(&self, subject_id: &str) -> PurchaseOrder {
        let now = Utc::now();
        self.store
            .create_purchase(
                subject_id,
                PaymentStatus::Pending,
                Some(now - Duration::minutes(10)),
                now - Duration::minutes(40),
            )
            .expect("Failed to create stale purchase")
    }

    /// A pending order whose payment window is still open.
    pub fn fresh_pending_purchase(&self, subject_id: &str) -> PurchaseOrder {
        let now = Utc::now();
        self.store
            .create_purchase(
                subject_id,
                PaymentStatus::Pending,
                Some(now + Duration::minutes(20)),
                now,
            )
            .expect("Failed to create fresh purchase")
    }

    /// An attempt on a 30 minute exam, started `started_minutes_ago` ago.
    pub fn attempt_started(&self, subject_id: &str, started_minutes_ago: i64) -> ExamAttempt {
        let exam = self
            .store
            .create_exam("Weekly quiz", 30, None)
            .expect("Failed to create exam");
        self.store
            .start_attempt(
                &exam.id,
                subject_id,
                Utc::now() - Duration::minutes(started_minutes_ago),
            )
            .expect("Failed to start attempt")
    }
}
