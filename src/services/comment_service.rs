// Comment Service - comments on posts and the post's comments counter

use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::{
    current_time_millis, decode_cursor, millis_to_datetime, normalize_page_size, CommentId, Page,
    PostId, TextRules, UserId,
};
use crate::error::{is_foreign_key_violation, AppError, AppResult};
use crate::infrastructure::{Database, IdGenerator, Job, TaskQueue};
use crate::models::comment::CommentRow;
use crate::models::{Comment, UserSummary};
use crate::services::queries::{push_page, select_comments};

#[derive(Clone)]
pub struct CommentService {
    db: Database,
    ids: Arc<IdGenerator>,
    rules: Arc<TextRules>,
    queue: Arc<TaskQueue>,
}

impl CommentService {
    pub fn new(
        db: Database,
        ids: Arc<IdGenerator>,
        rules: Arc<TextRules>,
        queue: Arc<TaskQueue>,
    ) -> Self {
        Self {
            db,
            ids,
            rules,
            queue,
        }
    }

    /// Adds a comment and bumps the post's comment count in one transaction
    #[instrument(skip(self, content))]
    pub async fn create_comment(
        &self,
        caller: UserId,
        post_id: PostId,
        content: &str,
    ) -> AppResult<Comment> {
        let content = self.rules.content(content)?;
        let comment_id = CommentId(self.ids.next_id());
        let created_at = current_time_millis();

        let (username, avatar) = {
            let content = content.clone();
            self.db
                .execute_tx("create comment", move |tx| {
                    let content = content.clone();
                    Box::pin(async move {
                        let updated = sqlx::query(
                            "UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?",
                        )
                        .bind(post_id)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| AppError::storage("could not increment post comments count", e))?
                        .rows_affected();
                        if updated == 0 {
                            return Err(AppError::post_not_found());
                        }

                        sqlx::query(
                            "INSERT INTO comments (id, user_id, post_id, content, created_at) \
                             VALUES (?, ?, ?, ?, ?)",
                        )
                        .bind(comment_id)
                        .bind(caller)
                        .bind(post_id)
                        .bind(content)
                        .bind(created_at)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| {
                            if is_foreign_key_violation(&e) {
                                AppError::user_gone()
                            } else {
                                AppError::storage("could not insert comment", e)
                            }
                        })?;

                        sqlx::query_as::<_, (String, Option<String>)>(
                            "SELECT username, avatar FROM users WHERE id = ?",
                        )
                        .bind(caller)
                        .fetch_one(&mut **tx)
                        .await
                        .map_err(|e| AppError::storage("could not select comment author", e))
                    })
                })
                .await?
        };

        info!("Created comment {} on post {}", comment_id, post_id);
        self.queue.submit(Job::CommentCreated {
            post_id,
            commenter_id: caller,
            content: content.clone(),
        });

        Ok(Comment {
            id: comment_id,
            post_id,
            author: UserSummary {
                id: caller,
                username,
                avatar,
            },
            content,
            created_at: millis_to_datetime(created_at),
            mine: true,
        })
    }

    /// Comments on a post, newest first
    #[instrument(skip(self, before))]
    pub async fn list_comments(
        &self,
        viewer: Option<UserId>,
        post_id: PostId,
        page_size: u32,
        before: Option<&str>,
    ) -> AppResult<Page<Comment>> {
        let before = decode_cursor(before)?;
        let page_size = normalize_page_size(page_size);

        let mut qb = select_comments(viewer);
        qb.push(" AND comments.post_id = ").push_bind(post_id);
        push_page(&mut qb, before.as_ref(), "comments.created_at", "comments.id", page_size);

        let rows: Vec<CommentRow> = qb
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select comments", e))?;

        Ok(Page::new(rows.into_iter().map(Comment::from).collect()))
    }
}
