use crate::course_store::CourseStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// The transactional store shared with request handlers.
    pub course_store: Arc<dyn CourseStore>,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, course_store: Arc<dyn CourseStore>) -> Self {
        Self {
            cancellation_token,
            course_store,
        }
    }

    /// Jobs check this before reading their candidates and return
    /// `JobError::Cancelled` if true. A firing already past that point runs to
    /// completion.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
