// Social Graph - read access to follow edges
// Edges are written by the identity service; this crate only reads them.

use async_trait::async_trait;

use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::Database;

#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Everyone following `user_id`
    async fn followers(&self, user_id: UserId) -> AppResult<Vec<UserId>>;
}

/// Reads the local `follows` table
#[derive(Debug, Clone)]
pub struct SqliteSocialGraph {
    db: Database,
}

impl SqliteSocialGraph {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SocialGraph for SqliteSocialGraph {
    async fn followers(&self, user_id: UserId) -> AppResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT follower_id FROM follows WHERE followee_id = ? ORDER BY follower_id",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AppError::storage("could not select followers", e))
    }
}
