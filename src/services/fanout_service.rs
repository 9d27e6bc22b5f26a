// Fan-out Service - copies a new post into each follower's timeline
// Runs after the post commits. Delivery is best effort: one follower failing
// does not stop the others, and re-running a fan-out adds nothing new.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::{PostId, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{Database, IdGenerator};
use crate::services::social_graph::SocialGraph;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub inserted: usize,
    pub already_present: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct FanOutService {
    db: Database,
    ids: Arc<IdGenerator>,
    graph: Arc<dyn SocialGraph>,
}

impl FanOutService {
    pub fn new(db: Database, ids: Arc<IdGenerator>, graph: Arc<dyn SocialGraph>) -> Self {
        Self { db, ids, graph }
    }

    #[instrument(skip(self), fields(post_id = %post_id, author = %author_id))]
    pub async fn fan_out(&self, post_id: PostId, author_id: UserId) -> AppResult<FanOutReport> {
        let followers = self.graph.followers(author_id).await?;
        let mut report = FanOutReport::default();

        for follower in followers {
            if follower == author_id {
                continue;
            }
            match self.insert_timeline_item(follower, post_id).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.already_present += 1,
                Err(e) => {
                    warn!("Fan-out of post {} to user {} failed: {}", post_id, follower, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Fan-out of post {} done: {} inserted, {} already present, {} failed",
            post_id, report.inserted, report.already_present, report.failed
        );
        Ok(report)
    }

    /// Returns false when the follower already has the post
    async fn insert_timeline_item(&self, user_id: UserId, post_id: PostId) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO timeline (id, user_id, post_id) VALUES (?, ?, ?) \
             ON CONFLICT (user_id, post_id) DO NOTHING",
        )
        .bind(self.ids.next_id())
        .bind(user_id)
        .bind(post_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| AppError::storage("could not insert timeline item", e))?;

        Ok(result.rows_affected() == 1)
    }
}
