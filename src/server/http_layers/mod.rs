mod auth;
mod requests_logging;

pub use auth::{require_auth, require_role};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
