use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Error taxonomy shared by every store and service.
///
/// `Conflict` only exists so the transaction wrapper can tell a retryable store
/// conflict apart from a hard failure; it is converted to `Internal` once the
/// retry budget is spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    InvalidArgument(String),
    NotFound(String),
    Unauthenticated,
    Gone(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    pub fn invalid_post_id() -> Self {
        AppError::InvalidArgument("invalid post id".to_string())
    }

    pub fn invalid_content() -> Self {
        AppError::InvalidArgument("invalid content".to_string())
    }

    pub fn invalid_spoiler() -> Self {
        AppError::InvalidArgument("invalid spoiler".to_string())
    }

    pub fn invalid_username() -> Self {
        AppError::InvalidArgument("invalid username".to_string())
    }

    pub fn invalid_cursor() -> Self {
        AppError::InvalidArgument("invalid cursor".to_string())
    }

    pub fn invalid_update_post_params() -> Self {
        AppError::InvalidArgument("invalid update post params".to_string())
    }

    pub fn invalid_notification_id() -> Self {
        AppError::InvalidArgument("invalid notification id".to_string())
    }

    pub fn invalid_timeline_item_id() -> Self {
        AppError::InvalidArgument("invalid timeline item id".to_string())
    }

    pub fn post_not_found() -> Self {
        AppError::NotFound("post not found".to_string())
    }

    pub fn notification_not_found() -> Self {
        AppError::NotFound("notification not found".to_string())
    }

    pub fn user_gone() -> Self {
        AppError::Gone("user gone".to_string())
    }

    /// Wraps a storage failure with the statement that produced it.
    ///
    /// Lock contention is reported as `Conflict` so the surrounding
    /// transaction can be retried; everything else is `Internal`.
    pub fn storage(context: &str, err: sqlx::Error) -> Self {
        if is_retryable(&err) {
            AppError::Conflict(format!("{}: {}", context, err))
        } else {
            AppError::Internal(format!("{}: {}", context, err))
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthenticated => write!(f, "Unauthenticated"),
            AppError::Gone(msg) => write!(f, "Gone: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated".to_string()),
            AppError::Gone(msg) => (StatusCode::GONE, msg.clone()),
            AppError::Conflict(msg) => {
                tracing::warn!("Conflict surfaced to caller: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "try again".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// SQLite reports lock contention as BUSY (5) or LOCKED (6), possibly with an
/// extended code in the upper bits.
pub fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        _ => false,
    }
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
