use crate::core::UserId;
use crate::error::{AppError, AppResult};

/// Who is making the current request.
///
/// Built once per request by the viewer middleware. Anonymous viewers can
/// read; every write requires an authenticated one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: Option<UserId>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn authenticated(user_id: UserId, request_id: String) -> Self {
        Self {
            user_id: Some(user_id),
            request_id,
        }
    }

    pub fn anonymous(request_id: String) -> Self {
        Self {
            user_id: None,
            request_id,
        }
    }

    /// The caller's id, or `Unauthenticated`
    pub fn require_user(&self) -> AppResult<UserId> {
        self.user_id.ok_or(AppError::Unauthenticated)
    }
}
