//! Authentication middleware — Bearer token extraction and JWT verification.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use pilates_core::models::auth::OwnerId;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// The verified caller, stored in request extensions.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedOwner(pub OwnerId);

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedOwner` into request extensions. Rejects with 401
/// before the handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            debug!(path = %request.uri().path(), "rejected: missing authorization header");
            AppError::Unauthorized("Missing authorization header".into())
        })?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let owner = state.tokens.verify(token.trim()).map_err(|e| {
        debug!(path = %request.uri().path(), "rejected: {e}");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    request.extensions_mut().insert(AuthenticatedOwner(owner));

    Ok(next.run(request).await)
}
