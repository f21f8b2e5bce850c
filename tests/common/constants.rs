//! Shared constants for end-to-end tests
//!
//! When test identities or timings change, update only this file.

// ============================================================================
// Test Identities
// ============================================================================

/// Student subject id
pub const STUDENT_ID: &str = "student-1";

/// A second student, used for ownership checks
pub const OTHER_STUDENT_ID: &str = "student-2";

/// Teacher subject id
pub const TEACHER_ID: &str = "teacher-1";

/// Admin subject id
pub const ADMIN_ID: &str = "admin-1";

// ============================================================================
// Credential Secrets
// ============================================================================

pub const SESSION_SECRET: &str = "e2e-session-secret";

pub const VERIFICATION_SECRET: &str = "e2e-verification-secret";

// ============================================================================
// Background Job IDs
// ============================================================================

pub const SESSION_REAPER_JOB: &str = "session_reaper";

pub const PURCHASE_EXPIRER_JOB: &str = "purchase_expirer";

pub const QUIZ_AUTO_SUBMIT_JOB: &str = "quiz_auto_submit";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server or jobs (milliseconds)
pub const POLL_INTERVAL_MS: u64 = 20;

/// Maximum time to wait for a triggered job to finish (milliseconds)
pub const JOB_COMPLETION_TIMEOUT_MS: u64 = 5000;

/// HTTP request timeout (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 5;
