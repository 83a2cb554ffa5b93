//! Authentication request handlers.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::models::{LoginRequest, TokenResponse};

/// `POST /auth/login` — authenticate with username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let issued = pilates_core::auth::login(
        state.store.as_ref(),
        &state.tokens,
        &body.username,
        &body.password,
    )
    .await?;
    Ok(Json(TokenResponse {
        access_token: issued.access_token,
        token_type: "Bearer".into(),
        expires_in: issued.expires_in,
    }))
}
