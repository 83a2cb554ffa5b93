//! Lesson session request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use pilates_core::models::domain::NewLessonSession;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::auth::AuthenticatedOwner;
use crate::models::{SessionListQuery, SessionResponse};

/// `GET /sessions?clientId=`
pub async fn list_sessions_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiQuery(query): ApiQuery<SessionListQuery>,
) -> AppResult<Json<Vec<SessionResponse>>> {
    let sessions = state.store.list_sessions(&owner, query.client_id).await?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// `POST /sessions` — the client must belong to the caller.
pub async fn create_session_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiJson(body): ApiJson<NewLessonSession>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    body.validate()?;
    let session = state.store.create_session(&owner, &body).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// `GET /sessions/{sessionId}`
pub async fn get_session_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.store.get_session(&owner, session_id).await?;
    Ok(Json(session.into()))
}

/// `DELETE /sessions/{sessionId}`
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.store.delete_session(&owner, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
