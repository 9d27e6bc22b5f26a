// ViewerContext Middleware - resolves the caller and injects it into request extensions
// Handlers never look at headers; they only see the ViewerContext.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::viewer::ViewerContext;

/// Turns a bearer token into a user id.
///
/// Token issuance lives in the identity service; this crate only consumes
/// the result.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> AppResult<UserId>;
}

/// Development verifier: the token *is* the user id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevTokenVerifier;

#[async_trait]
impl TokenVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<UserId> {
        token.parse().map_err(|_| AppError::Unauthenticated)
    }
}

/// Verifier used when no identity backend is configured; rejects every token.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTokenVerifier;

#[async_trait]
impl TokenVerifier for DisabledTokenVerifier {
    async fn verify(&self, _token: &str) -> AppResult<UserId> {
        Err(AppError::Unauthenticated)
    }
}

/// Application state that can verify tokens
pub trait HasTokenVerifier {
    fn token_verifier(&self) -> &Arc<dyn TokenVerifier>;
}

/// Builds the request-scoped ViewerContext.
///
/// No `Authorization` header means an anonymous viewer. A header that is not
/// a valid bearer token is rejected with 401.
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasTokenVerifier + Clone + Send + Sync + 'static,
{
    let request_id = format!("req-{}", Uuid::new_v4());

    let viewer_context = match bearer_token(request.headers())? {
        Some(token) => {
            let user_id = app_state.token_verifier().verify(token).await?;
            debug!("{} authenticated as user {}", request_id, user_id);
            ViewerContext::authenticated(user_id, request_id)
        }
        None => ViewerContext::anonymous(request_id),
    };

    request.extensions_mut().insert(Arc::new(viewer_context));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> AppResult<Option<&str>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AppError::Unauthenticated)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AppError::Unauthenticated),
    }
}
