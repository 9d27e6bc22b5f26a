// Post Service - post lifecycle: create, read, list, update, delete
// Writes commit first; fan-out and mention notifications are queued after
// the commit and never affect the caller's result.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::core::{
    current_time_millis, decode_cursor, millis_to_datetime, normalize_page_size, Page, PostId,
    TextRules, TimelineItemId, UserId,
};
use crate::error::{is_foreign_key_violation, AppError, AppResult};
use crate::infrastructure::{Database, IdGenerator, Job, TaskQueue};
use crate::models::post::PostRow;
use crate::models::{Post, TimelineItem, UpdatePost, UpdatedPostFields, UserSummary};
use crate::services::queries::{push_page, select_posts};

#[derive(Clone)]
pub struct PostService {
    db: Database,
    ids: Arc<IdGenerator>,
    rules: Arc<TextRules>,
    queue: Arc<TaskQueue>,
}

impl PostService {
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

    /// Publishes a post and puts it on the author's own timeline.
    ///
    /// The post, the author's subscription and the timeline item are written
    /// in one transaction. The returned item carries the post as the author
    /// sees it.
    #[instrument(skip(self, content, spoiler_of), fields(author = %author_id))]
    pub async fn create_post(
        &self,
        author_id: UserId,
        content: &str,
        spoiler_of: Option<&str>,
        nsfw: bool,
    ) -> AppResult<TimelineItem> {
        let content = self.rules.content(content)?;
        let spoiler_of = spoiler_of
            .map(|spoiler| self.rules.spoiler(spoiler))
            .transpose()?;

        let post_id = PostId(self.ids.next_id());
        let item_id = TimelineItemId(self.ids.next_id());
        let created_at = current_time_millis();

        let (username, avatar) = {
            let content = content.clone();
            let spoiler_of = spoiler_of.clone();
            self.db
                .execute_tx("create post", move |tx| {
                    let content = content.clone();
                    let spoiler_of = spoiler_of.clone();
                    Box::pin(async move {
                        sqlx::query(
                            "INSERT INTO posts (id, user_id, content, spoiler_of, nsfw, created_at) \
                             VALUES (?, ?, ?, ?, ?, ?)",
                        )
                        .bind(post_id)
                        .bind(author_id)
                        .bind(content)
                        .bind(spoiler_of)
                        .bind(nsfw)
                        .bind(created_at)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| {
                            if is_foreign_key_violation(&e) {
                                AppError::user_gone()
                            } else {
                                AppError::storage("could not insert post", e)
                            }
                        })?;

                        sqlx::query("INSERT INTO post_subscriptions (user_id, post_id) VALUES (?, ?)")
                            .bind(author_id)
                            .bind(post_id)
                            .execute(&mut **tx)
                            .await
                            .map_err(|e| AppError::storage("could not insert post subscription", e))?;

                        sqlx::query("INSERT INTO timeline (id, user_id, post_id) VALUES (?, ?, ?)")
                            .bind(item_id)
                            .bind(author_id)
                            .bind(post_id)
                            .execute(&mut **tx)
                            .await
                            .map_err(|e| AppError::storage("could not insert timeline item", e))?;

                        sqlx::query_as::<_, (String, Option<String>)>(
                            "SELECT username, avatar FROM users WHERE id = ?",
                        )
                        .bind(author_id)
                        .fetch_one(&mut **tx)
                        .await
                        .map_err(|e| AppError::storage("could not select post author", e))
                    })
                })
                .await?
        };

        info!("Created post {} by user {}", post_id, author_id);

        self.queue.submit(Job::FanOut { post_id, author_id });
        self.queue.submit(Job::PostMentions {
            post_id,
            author_id,
            content: content.clone(),
        });

        let post = Post {
            id: post_id,
            author: UserSummary {
                id: author_id,
                username,
                avatar,
            },
            content,
            spoiler_of,
            nsfw,
            likes_count: 0,
            comments_count: 0,
            created_at: millis_to_datetime(created_at),
            mine: true,
            liked: false,
            subscribed: true,
        };

        Ok(TimelineItem {
            id: item_id,
            user_id: author_id,
            post_id,
            post: Some(post),
        })
    }

    /// Posts of one user, newest first, paging backwards from `before`
    #[instrument(skip(self, before))]
    pub async fn list_posts(
        &self,
        viewer: Option<UserId>,
        username: &str,
        page_size: u32,
        before: Option<&str>,
    ) -> AppResult<Page<Post>> {
        let username = self.rules.username(username)?.to_string();
        let before = decode_cursor(before)?;
        let page_size = normalize_page_size(page_size);

        let mut qb = select_posts(viewer);
        qb.push(" AND users.username = ").push_bind(username);
        push_page(&mut qb, before.as_ref(), "posts.created_at", "posts.id", page_size);

        let rows: Vec<PostRow> = qb
            .build_query_as()
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select posts", e))?;

        Ok(Page::new(rows.into_iter().map(Post::from).collect()))
    }

    #[instrument(skip(self))]
    pub async fn get_post(&self, viewer: Option<UserId>, post_id: PostId) -> AppResult<Post> {
        let mut qb = select_posts(viewer);
        qb.push(" AND posts.id = ").push_bind(post_id);

        let row: Option<PostRow> = qb
            .build_query_as()
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| AppError::storage("could not select post", e))?;

        row.map(Post::from).ok_or_else(AppError::post_not_found)
    }

    /// Updates the caller's own post. A post the caller does not own is
    /// reported as not found.
    #[instrument(skip(self, params))]
    pub async fn update_post(
        &self,
        caller: UserId,
        post_id: PostId,
        params: UpdatePost,
    ) -> AppResult<UpdatedPostFields> {
        if params.is_empty() {
            return Err(AppError::invalid_update_post_params());
        }
        let content = params
            .content
            .as_deref()
            .map(|content| self.rules.content(content))
            .transpose()?;
        let spoiler_of = params
            .spoiler_of
            .as_deref()
            .map(|spoiler| self.rules.spoiler(spoiler))
            .transpose()?;
        let nsfw = params.nsfw;

        let updated = self
            .db
            .execute_tx("update post", move |tx| {
                let content = content.clone();
                let spoiler_of = spoiler_of.clone();
                Box::pin(async move {
                    let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new("UPDATE posts SET ");
                    let mut set = qb.separated(", ");
                    if let Some(content) = content {
                        set.push("content = ").push_bind_unseparated(content);
                    }
                    if let Some(spoiler_of) = spoiler_of {
                        set.push("spoiler_of = ").push_bind_unseparated(spoiler_of);
                    }
                    if let Some(nsfw) = nsfw {
                        set.push("nsfw = ").push_bind_unseparated(nsfw);
                    }
                    qb.push(" WHERE id = ")
                        .push_bind(post_id)
                        .push(" AND user_id = ")
                        .push_bind(caller)
                        .push(" RETURNING content, spoiler_of, nsfw");

                    qb.build_query_as::<(String, Option<String>, i64)>()
                        .fetch_optional(&mut **tx)
                        .await
                        .map_err(|e| AppError::storage("could not update post", e))
                })
            })
            .await?;

        let (content, spoiler_of, nsfw) = updated.ok_or_else(AppError::post_not_found)?;
        debug!("Updated post {}", post_id);
        Ok(UpdatedPostFields {
            content,
            spoiler_of,
            nsfw: nsfw != 0,
        })
    }

    /// Deletes the caller's own post and everything hanging off it.
    /// Deleting a post the caller does not own, or that is already gone,
    /// does nothing.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, caller: UserId, post_id: PostId) -> AppResult<()> {
        let deleted = self
            .db
            .execute_tx("delete post", move |tx| {
                Box::pin(async move {
                    sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
                        .bind(post_id)
                        .bind(caller)
                        .execute(&mut **tx)
                        .await
                        .map(|result| result.rows_affected())
                        .map_err(|e| AppError::storage("could not delete post", e))
                })
            })
            .await?;

        if deleted > 0 {
            info!("Deleted post {}", post_id);
        }
        Ok(())
    }
}
