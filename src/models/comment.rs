use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{millis_to_datetime, CommentId, Cursor, Keyed, PostId, UserId};
use crate::models::UserSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub mine: bool,
}

impl Keyed for Comment {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.id.value(), self.created_at)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: i64,
    pub author_id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub mine: i64,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: CommentId(row.id),
            post_id: PostId(row.post_id),
            author: UserSummary {
                id: UserId(row.author_id),
                username: row.username,
                avatar: row.avatar,
            },
            content: row.content,
            created_at: millis_to_datetime(row.created_at),
            mine: row.mine != 0,
        }
    }
}
