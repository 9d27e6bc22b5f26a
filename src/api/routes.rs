// Router - the JSON API under /api

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers::*;
use crate::app_state::AppState;
use crate::infrastructure::middleware::viewer_context_middleware;

pub fn create_api_router(state: AppState) -> Router {
    let api = Router::new()
        // Posts
        .route("/posts", post(create_post_handler))
        .route("/users/{username}/posts", get(list_posts_handler))
        .route(
            "/posts/{id}",
            get(get_post_handler)
                .patch(update_post_handler)
                .delete(delete_post_handler),
        )
        .route("/posts/{id}/toggle_like", post(toggle_post_like_handler))
        .route(
            "/posts/{id}/toggle_subscription",
            post(toggle_post_subscription_handler),
        )
        // Comments
        .route(
            "/posts/{id}/comments",
            get(list_comments_handler).post(create_comment_handler),
        )
        // Timeline
        .route("/timeline", get(timeline_handler))
        .route("/timeline/{id}", delete(delete_timeline_item_handler))
        // Notifications
        .route("/notifications", get(notifications_handler))
        .route(
            "/has_unread_notifications",
            get(has_unread_notifications_handler),
        )
        .route(
            "/notifications/{id}/mark_as_read",
            post(mark_notification_as_read_handler),
        )
        .route(
            "/mark_notifications_as_read",
            post(mark_notifications_as_read_handler),
        );

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
