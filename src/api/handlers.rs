// HTTP Handlers - thin JSON adapters over the services
// Ids arrive as strings and are validated here; everything else is the
// services' job.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    app_state::AppState,
    core::{NotificationId, Page, PostId, TimelineItemId},
    error::{AppError, AppResult},
    infrastructure::Vc,
    models::{
        Comment, Notification, Post, TimelineItem, ToggleLikeOutput, ToggleSubscriptionOutput,
        UpdatePost, UpdatedPostFields,
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    pub spoiler_of: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// `?last=<page size>&before=<cursor>`
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub last: Option<u32>,
    pub before: Option<String>,
}

impl PageQuery {
    fn page_size(&self) -> u32 {
        self.last.unwrap_or(0)
    }

    fn before(&self) -> Option<&str> {
        self.before.as_deref().filter(|before| !before.is_empty())
    }
}

fn parse_post_id(raw: &str) -> AppResult<PostId> {
    raw.parse().map_err(|_| AppError::invalid_post_id())
}

fn parse_timeline_item_id(raw: &str) -> AppResult<TimelineItemId> {
    raw.parse().map_err(|_| AppError::invalid_timeline_item_id())
}

fn parse_notification_id(raw: &str) -> AppResult<NotificationId> {
    raw.parse().map_err(|_| AppError::invalid_notification_id())
}

pub async fn create_post_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    let caller = vc.require_user()?;
    let item = state
        .posts
        .create_post(caller, &req.content, req.spoiler_of.as_deref(), req.nsfw)
        .await?;
    Ok((StatusCode::CREATED, Json::<TimelineItem>(item)))
}

pub async fn list_posts_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<Post>>> {
    let posts = state
        .posts
        .list_posts(vc.user_id, &username, page.page_size(), page.before())
        .await?;
    Ok(Json(posts))
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<String>,
) -> AppResult<Json<Post>> {
    let post_id = parse_post_id(&post_id)?;
    Ok(Json(state.posts.get_post(vc.user_id, post_id).await?))
}

pub async fn update_post_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<String>,
    Json(params): Json<UpdatePost>,
) -> AppResult<Json<UpdatedPostFields>> {
    let caller = vc.require_user()?;
    let post_id = parse_post_id(&post_id)?;
    Ok(Json(state.posts.update_post(caller, post_id, params).await?))
}

pub async fn delete_post_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<String>,
) -> AppResult<StatusCode> {
    let caller = vc.require_user()?;
    let post_id = parse_post_id(&post_id)?;
    state.posts.delete_post(caller, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_post_like_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<String>,
) -> AppResult<Json<ToggleLikeOutput>> {
    let caller = vc.require_user()?;
    let post_id = parse_post_id(&post_id)?;
    Ok(Json(state.engagement.toggle_post_like(caller, post_id).await?))
}

pub async fn toggle_post_subscription_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<String>,
) -> AppResult<Json<ToggleSubscriptionOutput>> {
    let caller = vc.require_user()?;
    let post_id = parse_post_id(&post_id)?;
    Ok(Json(
        state
            .engagement
            .toggle_post_subscription(caller, post_id)
            .await?,
    ))
}

pub async fn create_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    let caller = vc.require_user()?;
    let post_id = parse_post_id(&post_id)?;
    let comment = state
        .comments
        .create_comment(caller, post_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json::<Comment>(comment)))
}

pub async fn list_comments_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<Comment>>> {
    let post_id = parse_post_id(&post_id)?;
    let comments = state
        .comments
        .list_comments(vc.user_id, post_id, page.page_size(), page.before())
        .await?;
    Ok(Json(comments))
}

pub async fn timeline_handler(
    State(state): State<AppState>,
    vc: Vc,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<TimelineItem>>> {
    let caller = vc.require_user()?;
    let timeline = state
        .timeline
        .list_timeline(caller, page.page_size(), page.before())
        .await?;
    Ok(Json(timeline))
}

pub async fn delete_timeline_item_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(item_id): Path<String>,
) -> AppResult<StatusCode> {
    let caller = vc.require_user()?;
    let item_id = parse_timeline_item_id(&item_id)?;
    state.timeline.delete_timeline_item(caller, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn notifications_handler(
    State(state): State<AppState>,
    vc: Vc,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<Notification>>> {
    let caller = vc.require_user()?;
    let notifications = state
        .notifications
        .list_notifications(caller, page.page_size(), page.before())
        .await?;
    Ok(Json(notifications))
}

pub async fn has_unread_notifications_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<bool>> {
    let caller = vc.require_user()?;
    Ok(Json(state.notifications.has_unread(caller).await?))
}

pub async fn mark_notification_as_read_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(notification_id): Path<String>,
) -> AppResult<StatusCode> {
    let caller = vc.require_user()?;
    let notification_id = parse_notification_id(&notification_id)?;
    state
        .notifications
        .mark_as_read(caller, notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_notifications_as_read_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<StatusCode> {
    let caller = vc.require_user()?;
    state.notifications.mark_all_as_read(caller).await?;
    Ok(StatusCode::NO_CONTENT)
}
