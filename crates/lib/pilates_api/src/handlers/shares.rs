//! Share link request handlers: owner-side mint / list / revoke, plus the
//! anonymous view and photo fetch.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ApiPath;
use crate::middleware::auth::AuthenticatedOwner;
use crate::models::{
    CreateShareRequest, CreateShareResponse, RevokeSharesResponse, ShareLinkInfo,
    ShareLinkListResponse, SharedReportResponse,
};

/// `POST /reports/{reportId}/share` — body `{expireHours?}` is optional.
pub async fn create_share_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(report_id): ApiPath<Uuid>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<CreateShareResponse>)> {
    let request: CreateShareRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateShareRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?
    };

    let minted = state
        .shares
        .mint(&owner, report_id, request.expire_hours)
        .await?;
    Ok((StatusCode::CREATED, Json(minted.into())))
}

/// `GET /reports/{reportId}/shares`
pub async fn list_shares_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(report_id): ApiPath<Uuid>,
) -> AppResult<Json<ShareLinkListResponse>> {
    let links = state.shares.list(&owner, report_id).await?;
    Ok(Json(ShareLinkListResponse {
        shares: links.into_iter().map(ShareLinkInfo::from).collect(),
    }))
}

/// `DELETE /reports/{reportId}/share`
pub async fn revoke_shares_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(report_id): ApiPath<Uuid>,
) -> AppResult<Json<RevokeSharesResponse>> {
    let revoked = state.shares.revoke(&owner, report_id).await?;
    Ok(Json(RevokeSharesResponse { revoked }))
}

/// `GET /share/{token}` — anonymous; counts a view.
pub async fn open_share_handler(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> AppResult<Json<SharedReportResponse>> {
    let shared = state.shares.open(&token).await?;
    Ok(Json(shared.into()))
}

/// `GET /share/{token}/photos/{photoId}` — anonymous photo bytes.
pub async fn shared_photo_handler(
    State(state): State<AppState>,
    ApiPath((token, photo_id)): ApiPath<(String, Uuid)>,
) -> AppResult<Response> {
    let (photo, bytes) = state.shares.shared_photo(&token, photo_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, photo.content_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}
