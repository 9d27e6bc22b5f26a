// ViewerContext Extractor - hands the request's ViewerContext to handlers

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::error::AppError;
use crate::infrastructure::viewer::ViewerContext;

/// Cheap-to-clone handle to the request's `ViewerContext`.
///
/// Derefs to `ViewerContext`, so handlers write `vc.require_user()?`.
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        // Missing means the router was built without the viewer middleware.
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(Arc::clone(vc)))
            .ok_or_else(|| AppError::Internal("viewer context missing from request".to_string()));

        async move { vc }
    }
}
