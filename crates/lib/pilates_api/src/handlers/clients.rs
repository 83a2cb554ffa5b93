//! Client request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use pilates_core::models::domain::{ClientUpdate, NewClient};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::auth::AuthenticatedOwner;
use crate::models::ClientResponse;

/// `GET /clients`
pub async fn list_clients_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
) -> AppResult<Json<Vec<ClientResponse>>> {
    let clients = state.store.list_clients(&owner).await?;
    Ok(Json(clients.into_iter().map(ClientResponse::from).collect()))
}

/// `POST /clients`
pub async fn create_client_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiJson(body): ApiJson<NewClient>,
) -> AppResult<(StatusCode, Json<ClientResponse>)> {
    body.validate()?;
    let client = state.store.create_client(&owner, &body).await?;
    Ok((StatusCode::CREATED, Json(client.into())))
}

/// `GET /clients/{clientId}`
pub async fn get_client_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(client_id): ApiPath<Uuid>,
) -> AppResult<Json<ClientResponse>> {
    let client = state.store.get_client(&owner, client_id).await?;
    Ok(Json(client.into()))
}

/// `PATCH /clients/{clientId}`
pub async fn update_client_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(client_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ClientUpdate>,
) -> AppResult<Json<ClientResponse>> {
    body.validate()?;
    let client = state.store.update_client(&owner, client_id, &body).await?;
    Ok(Json(client.into()))
}

/// `DELETE /clients/{clientId}`
pub async fn delete_client_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    ApiPath(client_id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.store.delete_client(&owner, client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
