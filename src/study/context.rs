//! Per-request caller identity and deadline

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::clock::Clock;
use super::error::{StudyError, StudyResult};

/// Who is calling, and until when the caller is willing to wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Option<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
}

impl RequestContext {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            deadline: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Resolve the authenticated user and check the deadline has not passed
    pub(crate) fn begin(&self, clock: &dyn Clock) -> StudyResult<Uuid> {
        let user_id = self.user_id.ok_or(StudyError::Unauthorized)?;
        if let Some(deadline) = self.deadline {
            if clock.now() > deadline {
                return Err(StudyError::DeadlineExceeded);
            }
        }
        Ok(user_id)
    }
}
