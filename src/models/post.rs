use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{millis_to_datetime, Cursor, Keyed, PostId, UserId};
use crate::models::UserSummary;

/// A post as seen by a particular viewer.
///
/// `mine`, `liked` and `subscribed` are always false for anonymous viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author: UserSummary,
    pub content: String,
    pub spoiler_of: Option<String>,
    pub nsfw: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
    pub mine: bool,
    pub liked: bool,
    pub subscribed: bool,
}

impl Keyed for Post {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.id.value(), self.created_at)
    }
}

/// Row shape shared by both post projections
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: i64,
    pub content: String,
    pub spoiler_of: Option<String>,
    pub nsfw: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: i64,
    pub author_id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub mine: i64,
    pub liked: i64,
    pub subscribed: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: PostId(row.id),
            author: UserSummary {
                id: UserId(row.author_id),
                username: row.username,
                avatar: row.avatar,
            },
            content: row.content,
            spoiler_of: row.spoiler_of,
            nsfw: row.nsfw != 0,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            created_at: millis_to_datetime(row.created_at),
            mine: row.mine != 0,
            liked: row.liked != 0,
            subscribed: row.subscribed != 0,
        }
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub content: Option<String>,
    pub spoiler_of: Option<String>,
    pub nsfw: Option<bool>,
}

impl UpdatePost {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.spoiler_of.is_none() && self.nsfw.is_none()
    }
}

/// Editable fields after an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedPostFields {
    pub content: String,
    pub spoiler_of: Option<String>,
    pub nsfw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeOutput {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleSubscriptionOutput {
    pub subscribed: bool,
}
