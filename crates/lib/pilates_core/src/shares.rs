//! Report share links.
//!
//! An owner mints an opaque token for one of their reports; anyone holding
//! the token can read a snapshot of that report (and its photos) until the
//! link expires or is revoked. Only the SHA-256 of a token is stored.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::models::auth::OwnerId;
use crate::models::domain::{Photo, ShareLink, SharedReport};
use crate::photos::PhotoService;
use crate::store::{Store, StoreError, StoreResult};

/// Share lifetime when the owner does not pick one.
pub const DEFAULT_SHARE_TTL_HOURS: i64 = 72;
pub const MIN_SHARE_TTL_HOURS: i64 = 1;
pub const MAX_SHARE_TTL_HOURS: i64 = 720;

/// Length of a share token in alphanumeric characters (~380 bits).
const SHARE_TOKEN_LEN: usize = 64;

/// Result of minting a share link. `token` is only ever returned here.
#[derive(Debug, Clone)]
pub struct MintedShare {
    pub token: String,
    pub share_url: String,
    pub expires_at: DateTime<Utc>,
    pub link: ShareLink,
}

/// Resolve the requested TTL, rejecting out-of-range values.
pub fn resolve_ttl_hours(requested: Option<i64>) -> StoreResult<i64> {
    let hours = requested.unwrap_or(DEFAULT_SHARE_TTL_HOURS);
    if !(MIN_SHARE_TTL_HOURS..=MAX_SHARE_TTL_HOURS).contains(&hours) {
        return Err(StoreError::Validation(format!(
            "expireHours must be between {MIN_SHARE_TTL_HOURS} and {MAX_SHARE_TTL_HOURS}"
        )));
    }
    Ok(hours)
}

/// Generate a random share token (64 alphanumeric chars).
fn generate_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a token for storage.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Tokens we issue have a fixed shape; anything else cannot exist.
fn is_well_formed(token: &str) -> bool {
    token.len() == SHARE_TOKEN_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Mints, lists, revokes and opens share links.
#[derive(Clone)]
pub struct ShareService {
    store: Arc<dyn Store>,
    photos: PhotoService,
    public_base_url: String,
}

impl ShareService {
    pub fn new(store: Arc<dyn Store>, photos: PhotoService, public_base_url: &str) -> Self {
        Self {
            store,
            photos,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL for a share token.
    pub fn share_url(&self, token: &str) -> String {
        format!("{}/share/{token}", self.public_base_url)
    }

    pub async fn mint(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        ttl_hours: Option<i64>,
    ) -> StoreResult<MintedShare> {
        self.mint_at(owner, report_id, ttl_hours, Utc::now()).await
    }

    /// Mint a link for an owned report, reusing the latest non-revoked link
    /// row when there is one.
    pub async fn mint_at(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        ttl_hours: Option<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<MintedShare> {
        let hours = resolve_ttl_hours(ttl_hours)?;
        let expires_at = now + Duration::hours(hours);
        let token = generate_token();

        let link = self
            .store
            .upsert_share(owner, report_id, &hash_token(&token), expires_at, now)
            .await?;
        info!(owner_id = %owner, %report_id, share_id = %link.id, hours, "share link minted");

        Ok(MintedShare {
            share_url: self.share_url(&token),
            token,
            expires_at,
            link,
        })
    }

    pub async fn list(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<ShareLink>> {
        self.store.list_shares(owner, report_id).await
    }

    /// Revoke all live links of an owned report.
    pub async fn revoke(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<u64> {
        let revoked = self.store.revoke_shares(owner, report_id, Utc::now()).await?;
        info!(owner_id = %owner, %report_id, revoked, "share links revoked");
        Ok(revoked)
    }

    pub async fn open(&self, token: &str) -> StoreResult<SharedReport> {
        self.open_at(token, Utc::now()).await
    }

    /// Anonymous open: counts a view and returns the report snapshot.
    pub async fn open_at(&self, token: &str, now: DateTime<Utc>) -> StoreResult<SharedReport> {
        if !is_well_formed(token) {
            return Err(StoreError::NotFound("share link".into()));
        }
        self.store.open_share(&hash_token(token), now).await
    }

    pub async fn shared_photo(
        &self,
        token: &str,
        photo_id: Uuid,
    ) -> StoreResult<(Photo, Vec<u8>)> {
        self.shared_photo_at(token, photo_id, Utc::now()).await
    }

    /// Anonymous photo fetch. The link must still be valid at `now`.
    pub async fn shared_photo_at(
        &self,
        token: &str,
        photo_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<(Photo, Vec<u8>)> {
        if !is_well_formed(token) {
            return Err(StoreError::NotFound("share link".into()));
        }
        let photo = self
            .store
            .shared_photo(&hash_token(token), photo_id, now)
            .await?;
        let bytes = self.photos.retrieve(&photo).await?;
        Ok((photo, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::seed_owner;
    use crate::models::domain::{NewClient, NewLessonSession, NewReport, Report};
    use crate::photos::MemoryPhotoStorage;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<dyn Store>,
        shares: ShareService,
        photos: PhotoService,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let photos = PhotoService::new(store.clone(), Arc::new(MemoryPhotoStorage::new()));
        let shares = ShareService::new(store.clone(), photos.clone(), "https://studio.example/");
        Fixture {
            store,
            shares,
            photos,
        }
    }

    async fn owner(store: &dyn Store, name: &str) -> OwnerId {
        seed_owner(store, name, "long-enough-pw", None).await.unwrap()
    }

    async fn report(store: &dyn Store, owner: &OwnerId) -> Report {
        let client = store
            .create_client(
                owner,
                &NewClient {
                    name: "Lena".into(),
                    phone: None,
                    email: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        let session = store
            .create_session(
                owner,
                &NewLessonSession {
                    client_id: client.id,
                    session_date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
                    duration_minutes: Some(50),
                    focus: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        store
            .create_report(
                owner,
                session.id,
                &NewReport {
                    summary: "Great roll-up progress".into(),
                    strengths: Some("Breathing".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[test]
    fn ttl_bounds() {
        assert_eq!(resolve_ttl_hours(None).unwrap(), DEFAULT_SHARE_TTL_HOURS);
        assert_eq!(resolve_ttl_hours(Some(1)).unwrap(), 1);
        assert_eq!(resolve_ttl_hours(Some(720)).unwrap(), 720);
        assert!(matches!(resolve_ttl_hours(Some(0)), Err(StoreError::Validation(_))));
        assert!(matches!(resolve_ttl_hours(Some(800)), Err(StoreError::Validation(_))));
        assert!(resolve_ttl_hours(Some(-5)).is_err());
    }

    #[test]
    fn tokens_are_long_random_and_hashed() {
        let a = generate_token();
        let b = generate_token();
        assert!(is_well_formed(&a));
        assert_ne!(a, b);
        assert_eq!(hash_token(&a).len(), 64);
        assert_ne!(hash_token(&a), a);
    }

    #[tokio::test]
    async fn default_ttl_is_72_hours() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let report = report(f.store.as_ref(), &a).await;
        let now = Utc::now();

        let minted = f.shares.mint_at(&a, report.id, None, now).await.unwrap();
        assert_eq!(minted.expires_at, now + Duration::hours(72));
        assert_eq!(
            minted.share_url,
            format!("https://studio.example/share/{}", minted.token)
        );
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_rejected_before_storage() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let report = report(f.store.as_ref(), &a).await;
        for hours in [0, 800] {
            let err = f.shares.mint(&a, report.id, Some(hours)).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
        assert!(f.shares.list(&a, report.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn two_opens_count_two_views() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let report = report(f.store.as_ref(), &a).await;
        let t0 = Utc::now();
        let minted = f.shares.mint_at(&a, report.id, None, t0).await.unwrap();

        let first = f
            .shares
            .open_at(&minted.token, t0 + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(first.view_count, 1);
        assert_eq!(first.client_name, "Lena");
        assert_eq!(first.summary, "Great roll-up progress");

        let second_at = t0 + Duration::minutes(5);
        let second = f.shares.open_at(&minted.token, second_at).await.unwrap();
        assert_eq!(second.view_count, 2);
        assert_eq!(second.last_viewed_at, Some(second_at));
    }

    #[tokio::test]
    async fn concurrent_opens_are_all_counted() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let report = report(f.store.as_ref(), &a).await;
        let minted = f.shares.mint(&a, report.id, None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let shares = f.shares.clone();
            let token = minted.token.clone();
            handles.push(tokio::spawn(async move { shares.open(&token).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let links = f.shares.list(&a, report.id).await.unwrap();
        assert_eq!(links[0].view_count, 16);
    }

    #[tokio::test]
    async fn expired_and_revoked_links_are_gone() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let report = report(f.store.as_ref(), &a).await;
        let t0 = Utc::now();
        let minted = f.shares.mint_at(&a, report.id, Some(1), t0).await.unwrap();

        let at_expiry = t0 + Duration::hours(1);
        assert!(matches!(
            f.shares.open_at(&minted.token, at_expiry).await,
            Err(StoreError::Gone(_))
        ));

        let fresh = f.shares.mint(&a, report.id, None).await.unwrap();
        assert_eq!(f.shares.revoke(&a, report.id).await.unwrap(), 1);
        assert!(matches!(
            f.shares.open(&fresh.token).await,
            Err(StoreError::Gone(_))
        ));
    }

    #[tokio::test]
    async fn unknown_or_malformed_token_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.shares.open(&"A".repeat(64)).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            f.shares.open("../../etc/passwd").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mint_reuses_latest_live_row() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let report = report(f.store.as_ref(), &a).await;

        let first = f.shares.mint(&a, report.id, None).await.unwrap();
        f.shares.open(&first.token).await.unwrap();
        let second = f.shares.mint(&a, report.id, Some(24)).await.unwrap();

        assert_eq!(first.link.id, second.link.id);
        assert_eq!(second.link.view_count, 0);
        assert_ne!(first.token, second.token);
        // The overwritten token no longer resolves.
        assert!(matches!(
            f.shares.open(&first.token).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(f.shares.list(&a, report.id).await.unwrap().len(), 1);

        // After a revoke, the next mint needs a fresh row.
        f.shares.revoke(&a, report.id).await.unwrap();
        let third = f.shares.mint(&a, report.id, None).await.unwrap();
        assert_ne!(third.link.id, second.link.id);
        assert_eq!(f.shares.list(&a, report.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_owner_cannot_mint_or_revoke() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let b = owner(f.store.as_ref(), "bert").await;
        let report = report(f.store.as_ref(), &a).await;

        assert!(matches!(
            f.shares.mint(&b, report.id, None).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            f.shares.revoke(&b, report.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            f.shares.list(&b, report.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn shared_photo_rechecks_validity() {
        let f = fixture();
        let a = owner(f.store.as_ref(), "anna").await;
        let report = report(f.store.as_ref(), &a).await;
        let photo = f
            .photos
            .upload(&a, report.id, "image/jpeg", b"jpeg")
            .await
            .unwrap();
        let t0 = Utc::now();
        let minted = f.shares.mint_at(&a, report.id, Some(1), t0).await.unwrap();

        let opened = f.shares.open_at(&minted.token, t0).await.unwrap();
        assert_eq!(opened.photo_ids, vec![photo.id]);

        let (meta, bytes) = f
            .shares
            .shared_photo_at(&minted.token, photo.id, t0 + Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(meta.content_type, "image/jpeg");
        assert_eq!(bytes, b"jpeg");

        assert!(matches!(
            f.shares
                .shared_photo_at(&minted.token, photo.id, t0 + Duration::hours(2))
                .await,
            Err(StoreError::Gone(_))
        ));
        assert!(matches!(
            f.shares
                .shared_photo_at(&minted.token, Uuid::new_v4(), t0)
                .await,
            Err(StoreError::NotFound(_))
        ));

        // Photo fetches do not count as views.
        let links = f.shares.list(&a, report.id).await.unwrap();
        assert_eq!(links[0].view_count, 1);
    }
}
