// Engagement Service - like and subscription toggles
// Each toggle flips the relation and its counter in one transaction and
// reports the state after the flip.

use sqlx::{Sqlite, Transaction};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::{PostId, UserId};
use crate::error::{is_foreign_key_violation, AppError, AppResult};
use crate::infrastructure::{Database, Job, TaskQueue};
use crate::models::{ToggleLikeOutput, ToggleSubscriptionOutput};

#[derive(Clone)]
pub struct EngagementService {
    db: Database,
    queue: Arc<TaskQueue>,
}

impl EngagementService {
    pub fn new(db: Database, queue: Arc<TaskQueue>) -> Self {
        Self { db, queue }
    }

    /// Likes the post if the caller has not, unlikes it otherwise
    #[instrument(skip(self))]
    pub async fn toggle_post_like(&self, caller: UserId, post_id: PostId) -> AppResult<ToggleLikeOutput> {
        let out = self
            .db
            .execute_tx("toggle post like", move |tx| {
                Box::pin(async move {
                    // One row removed means the like was on.
                    let removed = sqlx::query("DELETE FROM post_likes WHERE user_id = ? AND post_id = ?")
                        .bind(caller)
                        .bind(post_id)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| AppError::storage("could not delete post like", e))?
                        .rows_affected();

                    if removed > 0 {
                        let likes_count: i64 = sqlx::query_scalar(
                            "UPDATE posts SET likes_count = likes_count - 1 WHERE id = ? RETURNING likes_count",
                        )
                        .bind(post_id)
                        .fetch_one(&mut **tx)
                        .await
                        .map_err(|e| AppError::storage("could not decrement post likes count", e))?;

                        return Ok(ToggleLikeOutput {
                            liked: false,
                            likes_count,
                        });
                    }

                    let inserted = sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES (?, ?)")
                        .bind(caller)
                        .bind(post_id)
                        .execute(&mut **tx)
                        .await;
                    match inserted {
                        Ok(_) => {}
                        Err(e) if is_foreign_key_violation(&e) => {
                            return Err(missing_reference(tx, post_id).await);
                        }
                        Err(e) => return Err(AppError::storage("could not insert post like", e)),
                    }

                    let likes_count: i64 = sqlx::query_scalar(
                        "UPDATE posts SET likes_count = likes_count + 1 WHERE id = ? RETURNING likes_count",
                    )
                    .bind(post_id)
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(|e| AppError::storage("could not increment post likes count", e))?;

                    Ok(ToggleLikeOutput {
                        liked: true,
                        likes_count,
                    })
                })
            })
            .await?;

        debug!("Post {} like by {} is now {}", post_id, caller, out.liked);
        if out.liked {
            self.queue.submit(Job::PostLiked {
                post_id,
                liker_id: caller,
            });
        }
        Ok(out)
    }

    /// Subscribes the caller to the post's activity, or unsubscribes them
    #[instrument(skip(self))]
    pub async fn toggle_post_subscription(
        &self,
        caller: UserId,
        post_id: PostId,
    ) -> AppResult<ToggleSubscriptionOutput> {
        self.db
            .execute_tx("toggle post subscription", move |tx| {
                Box::pin(async move {
                    let removed =
                        sqlx::query("DELETE FROM post_subscriptions WHERE user_id = ? AND post_id = ?")
                            .bind(caller)
                            .bind(post_id)
                            .execute(&mut **tx)
                            .await
                            .map_err(|e| AppError::storage("could not delete post subscription", e))?
                            .rows_affected();

                    if removed > 0 {
                        return Ok(ToggleSubscriptionOutput { subscribed: false });
                    }

                    let inserted = sqlx::query("INSERT INTO post_subscriptions (user_id, post_id) VALUES (?, ?)")
                        .bind(caller)
                        .bind(post_id)
                        .execute(&mut **tx)
                        .await;
                    match inserted {
                        Ok(_) => {}
                        Err(e) if is_foreign_key_violation(&e) => {
                            return Err(missing_reference(tx, post_id).await);
                        }
                        Err(e) => return Err(AppError::storage("could not insert post subscription", e)),
                    }

                    Ok(ToggleSubscriptionOutput { subscribed: true })
                })
            })
            .await
    }
}

/// Names the side of a failed foreign key: the post, or else the caller.
async fn missing_reference(tx: &mut Transaction<'static, Sqlite>, post_id: PostId) -> AppError {
    let post_exists: Result<bool, sqlx::Error> =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?)")
            .bind(post_id)
            .fetch_one(&mut **tx)
            .await;
    match post_exists {
        Ok(true) => AppError::user_gone(),
        Ok(false) => AppError::post_not_found(),
        Err(e) => AppError::storage("could not check post existence", e),
    }
}
