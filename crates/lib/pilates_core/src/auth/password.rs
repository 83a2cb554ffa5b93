//! Owner passwords: the policy new passwords must meet, bcrypt hashing, and
//! the credential check used by login.

use std::sync::LazyLock;

use super::AuthError;
use crate::models::auth::{Credential, OwnerId};

/// Shortest accepted owner password, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

const BCRYPT_COST: u32 = 10;

/// Hash checked when the username is unknown, so both login failures cost
/// one bcrypt verification.
static DECOY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("no-such-owner", BCRYPT_COST).ok());

/// Reject passwords that do not meet the owner password policy.
pub fn check_policy(password: &str) -> Result<(), AuthError> {
    if password.trim().is_empty() || password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::ValidationError(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a new owner password after checking the policy.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    check_policy(password)?;
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Check `password` against the credential found for a username.
///
/// A missing credential and a wrong password both yield
/// `AuthError::InvalidCredentials`.
pub fn authenticate(password: &str, credential: Option<&Credential>) -> Result<OwnerId, AuthError> {
    let Some(credential) = credential else {
        if let Some(decoy) = DECOY_HASH.as_deref() {
            let _ = bcrypt::verify(password, decoy);
        }
        return Err(AuthError::InvalidCredentials);
    };

    let matches = bcrypt::verify(password, &credential.password_hash)
        .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))?;
    if !matches {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(credential.owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn credential(password: &str) -> Credential {
        Credential {
            username: "anna".into(),
            password_hash: hash_password(password).unwrap(),
            owner_id: OwnerId::new(Uuid::new_v4()),
        }
    }

    #[test]
    fn right_password_yields_owner() {
        let cred = credential("reformer-2026");
        assert_eq!(authenticate("reformer-2026", Some(&cred)).unwrap(), cred.owner_id);
    }

    #[test]
    fn wrong_password_and_missing_credential_match() {
        let cred = credential("reformer-2026");
        assert!(matches!(
            authenticate("mat-2026", Some(&cred)),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate("reformer-2026", None),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn corrupt_stored_hash_is_internal() {
        let cred = Credential {
            password_hash: "not-a-bcrypt-hash".into(),
            ..credential("reformer-2026")
        };
        assert!(matches!(
            authenticate("reformer-2026", Some(&cred)),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn policy_rejects_short_or_blank() {
        assert!(check_policy("short").is_err());
        assert!(check_policy("         ").is_err());
        assert!(check_policy("long-enough").is_ok());
        assert!(hash_password("short").is_err());
    }
}
