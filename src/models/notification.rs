use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{millis_to_datetime, Cursor, Keyed, NotificationId, PostId, UserId};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Mention,
    Comment,
    Reaction,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Mention => "mention",
            NotificationKind::Comment => "comment",
            NotificationKind::Reaction => "reaction",
            NotificationKind::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mention" => Ok(NotificationKind::Mention),
            "comment" => Ok(NotificationKind::Comment),
            "reaction" => Ok(NotificationKind::Reaction),
            "follow" => Ok(NotificationKind::Follow),
            other => Err(AppError::Internal(format!("Unknown notification kind: {}", other))),
        }
    }
}

/// Aggregated notification. Actors are kept in arrival order without repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub actor_ids: Vec<UserId>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub post_id: Option<PostId>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
}

impl Keyed for Notification {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.id.value(), self.issued_at)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub actor_ids: String,
    pub kind: String,
    pub post_id: Option<i64>,
    pub read_at: Option<i64>,
    pub issued_at: i64,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let actor_ids: Vec<UserId> = serde_json::from_str::<Vec<i64>>(&row.actor_ids)
            .map_err(|e| {
                AppError::Internal(format!("Corrupt actor ids on notification {}: {}", row.id, e))
            })?
            .into_iter()
            .map(UserId)
            .collect();

        Ok(Self {
            id: NotificationId(row.id),
            user_id: UserId(row.user_id),
            actor_ids,
            kind: row.kind.parse()?,
            post_id: row.post_id.map(PostId),
            read: row.read_at.is_some(),
            read_at: row.read_at.map(millis_to_datetime),
            issued_at: millis_to_datetime(row.issued_at),
        })
    }
}
