use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{Cursor, Keyed, PostId, TimelineItemId, UserId};
use crate::models::post::{Post, PostRow};

/// An entry in a user's feed.
///
/// `post` is the referenced post as the feed owner sees it. It is absent only
/// when an item is built without reading the post back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub id: TimelineItemId,
    pub user_id: UserId,
    pub post_id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
}

impl TimelineItem {
    fn post_created_at(&self) -> DateTime<Utc> {
        self.post
            .as_ref()
            .map(|post| post.created_at)
            .unwrap_or_default()
    }
}

impl Keyed for TimelineItem {
    /// Feed order follows the referenced post's creation time
    fn cursor(&self) -> Cursor {
        Cursor::new(self.id.value(), self.post_created_at())
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TimelineRow {
    pub timeline_item_id: i64,
    pub timeline_user_id: i64,
    #[sqlx(flatten)]
    pub post: PostRow,
}

impl From<TimelineRow> for TimelineItem {
    fn from(row: TimelineRow) -> Self {
        let post = Post::from(row.post);
        Self {
            id: TimelineItemId(row.timeline_item_id),
            user_id: UserId(row.timeline_user_id),
            post_id: post.id,
            post: Some(post),
        }
    }
}
