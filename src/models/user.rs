use serde::Serialize;

use crate::core::UserId;

/// Author fields embedded in posts and comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<String>,
}
