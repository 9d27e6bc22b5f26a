// Notification Service - creates, merges and reads notifications
//
// At most one unread notification exists per (recipient, kind, post). A new
// event of the same shape merges its actor into that row; once the row is
// read, the next event starts a fresh one.

use sqlx::{QueryBuilder, Sqlite};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::{
    current_time_millis, decode_cursor, normalize_page_size, NotificationId, Page, PostId, UserId,
};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::infrastructure::{Database, IdGenerator};
use crate::models::notification::NotificationRow;
use crate::models::{Notification, NotificationKind};
use crate::services::mentions::MentionParser;
use crate::services::queries::push_page;

#[derive(Clone)]
pub struct NotificationService {
    db: Database,
    ids: Arc<IdGenerator>,
    mentions: Arc<dyn MentionParser>,
}

impl NotificationService {
    pub fn new(db: Database, ids: Arc<IdGenerator>, mentions: Arc<dyn MentionParser>) -> Self {
        Self { db, ids, mentions }
    }

    /// Creates or merges the unread notification for `recipient`.
    ///
    /// Returns the id of the row that now carries `actor`.
    #[instrument(skip(self), fields(recipient = %recipient, kind = %kind))]
    pub async fn notify(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        post_id: Option<PostId>,
        actor: UserId,
    ) -> AppResult<NotificationId> {
        let ids = Arc::clone(&self.ids);

        self.db
            .execute_tx("upsert notification", move |tx| {
                let ids = Arc::clone(&ids);
                Box::pin(async move {
                    let now = current_time_millis();
                    let post_key = post_id.map(PostId::value).unwrap_or(0);

                    let existing: Option<(i64, String)> = sqlx::query_as(
                        "SELECT id, actor_ids FROM notifications \
                         WHERE user_id = ? AND kind = ? AND COALESCE(post_id, 0) = ? AND read_at IS NULL",
                    )
                    .bind(recipient)
                    .bind(kind.as_str())
                    .bind(post_key)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(|e| AppError::storage("could not select unread notification", e))?;

                    if let Some((id, actor_ids)) = existing {
                        let mut actors: Vec<i64> = serde_json::from_str(&actor_ids).map_err(|e| {
                            AppError::Internal(format!("Corrupt actor ids on notification {}: {}", id, e))
                        })?;
                        if !actors.contains(&actor.value()) {
                            actors.push(actor.value());
                        }
                        let actor_ids = serde_json::to_string(&actors)
                            .map_err(|e| AppError::Internal(format!("Failed to encode actor ids: {}", e)))?;

                        sqlx::query("UPDATE notifications SET actor_ids = ?, issued_at = ? WHERE id = ?")
                            .bind(actor_ids)
                            .bind(now)
                            .bind(id)
                            .execute(&mut **tx)
                            .await
                            .map_err(|e| AppError::storage("could not merge notification", e))?;

                        debug!("Merged actor {} into notification {}", actor, id);
                        return Ok(NotificationId(id));
                    }

                    let id = ids.next_id();
                    let actor_ids = format!("[{}]", actor.value());
                    sqlx::query(
                        "INSERT INTO notifications (id, user_id, actor_ids, kind, post_id, issued_at) \
                         VALUES (?, ?, ?, ?, ?, ?)",
                    )
                    .bind(id)
                    .bind(recipient)
                    .bind(actor_ids)
                    .bind(kind.as_str())
                    .bind(post_id)
                    .bind(now)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        // Another writer created the unread row first; the retry merges into it.
                        if is_unique_violation(&e) {
                            AppError::Conflict(format!("unread notification created concurrently: {}", e))
                        } else {
                            AppError::storage("could not insert notification", e)
                        }
                    })?;

                    Ok(NotificationId(id))
                })
            })
            .await
    }

    /// Notifies users mentioned in a new post. Returns how many were notified.
    #[instrument(skip(self, content), fields(post_id = %post_id))]
    pub async fn post_mentions(
        &self,
        post_id: PostId,
        author_id: UserId,
        content: &str,
    ) -> AppResult<usize> {
        self.notify_mentions(post_id, author_id, content).await
    }

    /// Notifies subscribers of the post, then users mentioned in the comment.
    /// The commenter is never notified, and a comment by the post's own author
    /// only produces mention notifications.
    #[instrument(skip(self, content), fields(post_id = %post_id))]
    pub async fn comment_created(
        &self,
        post_id: PostId,
        commenter_id: UserId,
        content: &str,
    ) -> AppResult<usize> {
        let author_id: Option<UserId> = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select post author", e))?;

        let Some(author_id) = author_id else {
            debug!("Post {} is gone, skipping comment notifications", post_id);
            return Ok(0);
        };

        let mut notified = 0;
        if author_id != commenter_id {
            let subscribers: Vec<UserId> = sqlx::query_scalar(
                "SELECT user_id FROM post_subscriptions WHERE post_id = ? AND user_id != ? ORDER BY user_id",
            )
            .bind(post_id)
            .bind(commenter_id)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select post subscribers", e))?;

            for subscriber in subscribers {
                match self
                    .notify(subscriber, NotificationKind::Comment, Some(post_id), commenter_id)
                    .await
                {
                    Ok(_) => notified += 1,
                    Err(e) => warn!("Comment notification for user {} failed: {}", subscriber, e),
                }
            }
        }

        notified += self.notify_mentions(post_id, commenter_id, content).await?;
        Ok(notified)
    }

    /// Notifies the post author about a like, when the author is still
    /// subscribed and did not like their own post. Returns whether a
    /// notification was issued.
    #[instrument(skip(self), fields(post_id = %post_id, liker = %liker_id))]
    pub async fn post_liked(&self, post_id: PostId, liker_id: UserId) -> AppResult<bool> {
        let author: Option<(UserId, i64)> = sqlx::query_as(
            "SELECT posts.user_id, EXISTS (SELECT 1 FROM post_subscriptions \
             WHERE post_subscriptions.post_id = posts.id AND post_subscriptions.user_id = posts.user_id) \
             FROM posts WHERE posts.id = ?",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AppError::storage("could not select post author", e))?;

        let Some((author_id, subscribed)) = author else {
            debug!("Post {} is gone, skipping reaction notification", post_id);
            return Ok(false);
        };
        if author_id == liker_id || subscribed == 0 {
            return Ok(false);
        }

        self.notify(author_id, NotificationKind::Reaction, Some(post_id), liker_id)
            .await?;
        Ok(true)
    }

    /// Notifies `followee` about a new follower
    #[instrument(skip(self))]
    pub async fn follow_created(&self, follower_id: UserId, followee_id: UserId) -> AppResult<bool> {
        if follower_id == followee_id {
            return Ok(false);
        }
        self.notify(followee_id, NotificationKind::Follow, None, follower_id)
            .await?;
        Ok(true)
    }

    async fn notify_mentions(&self, post_id: PostId, actor_id: UserId, content: &str) -> AppResult<usize> {
        let usernames = self.mentions.mentions(content);
        if usernames.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM users WHERE username IN (");
        let mut separated = qb.separated(", ");
        for username in &usernames {
            separated.push_bind(username.as_str());
        }
        qb.push(") AND id != ").push_bind(actor_id).push(" ORDER BY id");

        let recipients: Vec<UserId> = qb
            .build_query_scalar()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select mentioned users", e))?;

        let mut notified = 0;
        for recipient in recipients {
            match self
                .notify(recipient, NotificationKind::Mention, Some(post_id), actor_id)
                .await
            {
                Ok(_) => notified += 1,
                Err(e) => warn!("Mention notification for user {} failed: {}", recipient, e),
            }
        }
        Ok(notified)
    }

    /// The caller's notifications, most recently issued first
    #[instrument(skip(self, before))]
    pub async fn list_notifications(
        &self,
        caller: UserId,
        page_size: u32,
        before: Option<&str>,
    ) -> AppResult<Page<Notification>> {
        let before = decode_cursor(before)?;
        let page_size = normalize_page_size(page_size);

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, user_id, actor_ids, kind, post_id, read_at, issued_at \
             FROM notifications WHERE user_id = ",
        );
        qb.push_bind(caller);
        push_page(&mut qb, before.as_ref(), "issued_at", "id", page_size);

        let rows: Vec<NotificationRow> = qb
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select notifications", e))?;

        let items = rows
            .into_iter()
            .map(Notification::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(items))
    }

    pub async fn has_unread(&self, caller: UserId) -> AppResult<bool> {
        let unread: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM notifications WHERE user_id = ? AND read_at IS NULL)",
        )
        .bind(caller)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| AppError::storage("could not check unread notifications", e))?;
        Ok(unread != 0)
    }

    /// Marks one of the caller's notifications as read. Marking a read
    /// notification again is a no-op; someone else's is `NotFound`.
    #[instrument(skip(self))]
    pub async fn mark_as_read(&self, caller: UserId, id: NotificationId) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ? WHERE id = ? AND user_id = ? AND read_at IS NULL",
        )
        .bind(current_time_millis())
        .bind(id)
        .bind(caller)
        .execute(self.db.pool())
        .await
        .map_err(|e| AppError::storage("could not mark notification as read", e))?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM notifications WHERE id = ? AND user_id = ?)",
            )
            .bind(id)
            .bind(caller)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select notification", e))?;
            if exists == 0 {
                return Err(AppError::notification_not_found());
            }
        }
        Ok(())
    }

    /// Marks all of the caller's unread notifications as read
    #[instrument(skip(self))]
    pub async fn mark_all_as_read(&self, caller: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ? WHERE user_id = ? AND read_at IS NULL",
        )
        .bind(current_time_millis())
        .bind(caller)
        .execute(self.db.pool())
        .await
        .map_err(|e| AppError::storage("could not mark notifications as read", e))?;
        Ok(result.rows_affected())
    }
}
