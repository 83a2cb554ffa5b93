//! Authentication: password hashing, access tokens, and the login flow
//! against the credential store.

pub mod jwt;
pub mod password;

use thiserror::Error;
use tracing::info;

use crate::models::auth::{IssuedToken, OwnerId};
use crate::store::{Store, StoreError};
use jwt::TokenService;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Authenticate with username + password and issue an access token.
///
/// Unknown usernames and wrong passwords fail the same way.
pub async fn login(
    store: &dyn Store,
    tokens: &TokenService,
    username: &str,
    password: &str,
) -> Result<IssuedToken, AuthError> {
    let credential = store.find_credential(username).await?;
    let owner = password::authenticate(password, credential.as_ref())?;

    let issued = tokens.issue(&owner)?;
    info!(owner_id = %owner, "owner logged in");
    Ok(issued)
}

/// Create an owner with a login credential. Owners are provisioned out of
/// band (server seed flags, tests); there is no public registration.
pub async fn seed_owner(
    store: &dyn Store,
    username: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<OwnerId, AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::ValidationError("Username is required".into()));
    }
    let hash = password::hash_password(password)?;
    let owner = store.create_owner(username, display_name, &hash).await?;
    info!(owner_id = %owner, username, "seeded owner");
    Ok(owner)
}
