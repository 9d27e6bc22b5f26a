// Timeline Service - reads and prunes a user's feed

use tracing::{debug, instrument};

use crate::core::{decode_cursor, normalize_page_size, Page, TimelineItemId, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Database;
use crate::models::timeline::TimelineRow;
use crate::models::TimelineItem;
use crate::services::queries::{push_page, select_timeline};

#[derive(Clone)]
pub struct TimelineService {
    db: Database,
}

impl TimelineService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The caller's feed ordered by post creation time, newest first
    #[instrument(skip(self, before))]
    pub async fn list_timeline(
        &self,
        caller: UserId,
        page_size: u32,
        before: Option<&str>,
    ) -> AppResult<Page<TimelineItem>> {
        let before = decode_cursor(before)?;
        let page_size = normalize_page_size(page_size);

        let mut qb = select_timeline(caller);
        push_page(&mut qb, before.as_ref(), "posts.created_at", "timeline.id", page_size);

        let rows: Vec<TimelineRow> = qb
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select timeline", e))?;

        Ok(Page::new(rows.into_iter().map(TimelineItem::from).collect()))
    }

    /// Hides an item from the caller's feed. The post itself is untouched.
    #[instrument(skip(self))]
    pub async fn delete_timeline_item(&self, caller: UserId, item_id: TimelineItemId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM timeline WHERE id = ? AND user_id = ?")
            .bind(item_id)
            .bind(caller)
            .execute(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not delete timeline item", e))?;

        debug!("Removed {} timeline items", result.rows_affected());
        Ok(())
    }
}
