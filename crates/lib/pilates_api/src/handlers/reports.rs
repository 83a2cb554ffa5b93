//! Report request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use pilates_core::models::domain::{NewReport, ReportUpdate};
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::auth::AuthenticatedOwner;
use crate::models::ReportResponse;

/// `POST /sessions/{sessionId}/report` — 409 when the session already has one.
pub async fn create_report_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(session_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewReport>,
) -> AppResult<(StatusCode, Json<ReportResponse>)> {
    body.validate()?;
    let report = state.store.create_report(&owner, session_id, &body).await?;
    info!(owner_id = %owner, %session_id, report_id = %report.id, "report created");
    Ok((StatusCode::CREATED, Json(report.into())))
}

/// `GET /sessions/{sessionId}/report`
pub async fn get_session_report_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> AppResult<Json<ReportResponse>> {
    let report = state.store.get_report_for_session(&owner, session_id).await?;
    Ok(Json(report.into()))
}

/// `GET /reports`
pub async fn list_reports_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
) -> AppResult<Json<Vec<ReportResponse>>> {
    let reports = state.store.list_reports(&owner).await?;
    Ok(Json(reports.into_iter().map(ReportResponse::from).collect()))
}

/// `GET /reports/{reportId}`
pub async fn get_report_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(report_id): ApiPath<Uuid>,
) -> AppResult<Json<ReportResponse>> {
    let report = state.store.get_report(&owner, report_id).await?;
    Ok(Json(report.into()))
}

/// `PATCH /reports/{reportId}`
pub async fn update_report_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(report_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ReportUpdate>,
) -> AppResult<Json<ReportResponse>> {
    body.validate()?;
    let report = state.store.update_report(&owner, report_id, &body).await?;
    Ok(Json(report.into()))
}
