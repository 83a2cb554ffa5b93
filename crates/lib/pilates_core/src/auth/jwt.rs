//! JWT access token issuance and verification.
//!
//! Tokens are stateless HS256 JWTs carrying `{sub, iat, exp}`. Validity is a
//! function of signature and expiry only; there is no server-side revocation.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{IssuedToken, OwnerId, TokenClaims};

/// Default access token lifetime: 120 minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 120;

/// Minimum accepted signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Issues and verifies owner access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build a token service. Fails if `secret` is shorter than 32 bytes or
    /// the TTL is not positive.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::ValidationError(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if ttl <= Duration::zero() {
            return Err(AuthError::ValidationError(
                "Token TTL must be positive".into(),
            ));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        })
    }

    /// Token lifetime in seconds.
    pub fn expires_in(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a signed token for `owner`, valid for the configured TTL.
    pub fn issue(&self, owner: &OwnerId) -> Result<IssuedToken, AuthError> {
        self.issue_at(owner, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let claims = TokenClaims {
            sub: owner.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))?;
        Ok(IssuedToken {
            access_token,
            expires_in: self.expires_in(),
        })
    }

    /// Verify a token, returning the owner it was issued for.
    pub fn verify(&self, token: &str) -> Result<OwnerId, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against the clock value `now`.
    ///
    /// Every failure (bad signature, malformed input, missing claims,
    /// non-UUID subject, expiry reached) is `AuthError::InvalidToken`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<OwnerId, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| AuthError::InvalidToken(format!("jwt decode: {e}")))?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::InvalidToken("token expired".into()));
        }

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not an owner id".into()))?;
        Ok(OwnerId::new(id))
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if trimmed.len() >= MIN_SECRET_LEN {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Generate a random 64-character alphanumeric secret.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pilates")
        .join("jwt-secret")
}
