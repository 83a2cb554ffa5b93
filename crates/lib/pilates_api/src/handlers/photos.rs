//! Report photo request handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use pilates_core::photos::MAX_PHOTO_BYTES;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ApiPath;
use crate::middleware::auth::AuthenticatedOwner;
use crate::models::PhotoResponse;

/// `POST /reports/{reportId}/photos` — raw image body with an `image/*`
/// content type.
pub async fn upload_photo_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(report_id): ApiPath<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<PhotoResponse>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .unwrap_or_default();
    if !content_type.starts_with("image/") {
        return Err(AppError::UnsupportedMediaType(
            "Photos must be uploaded with an image/* content type".into(),
        ));
    }
    if body.len() > MAX_PHOTO_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "Photos are limited to {MAX_PHOTO_BYTES} bytes"
        )));
    }

    let photo = state
        .photos
        .upload(&owner, report_id, &content_type, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(photo.into())))
}

/// `GET /reports/{reportId}/photos`
pub async fn list_photos_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(report_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<PhotoResponse>>> {
    let photos = state.photos.list(&owner, report_id).await?;
    Ok(Json(photos.into_iter().map(PhotoResponse::from).collect()))
}

/// `GET /reports/{reportId}/photos/{photoId}`
pub async fn get_photo_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath((report_id, photo_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let (photo, bytes) = state.photos.download(&owner, report_id, photo_id).await?;
    Ok(([(header::CONTENT_TYPE, photo.content_type)], bytes).into_response())
}
