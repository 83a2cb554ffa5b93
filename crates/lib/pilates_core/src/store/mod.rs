//! Ownership-scoped persistence.
//!
//! Every owner-reachable read or write takes the caller's [`OwnerId`] and
//! filters on it together with the primary key or listing criteria. A row
//! that exists but belongs to another owner is reported exactly like a
//! missing row (`StoreError::NotFound`).
//!
//! Two deliberate exceptions skip the owner filter:
//! - the anonymous share path (`open_share`, `shared_photo`), scoped by
//!   share-token validity instead;
//! - the reminder scan (`claim_due_reminders`), a system job that never
//!   returns data over HTTP.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{Credential, OwnerId};
use crate::models::domain::{
    Client, ClientUpdate, DueReminder, LessonSession, NewClient, NewLessonSession, NewPhoto,
    NewReport, Photo, Report, ReportUpdate, ShareLink, SharedReport,
};
use crate::photos::StorageError;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing, or owned by someone else.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A share link that exists but is revoked or expired.
    #[error("Gone: {0}")]
    Gone(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Photo storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Id for a new client, lesson session, report, photo or share link row.
///
/// UUIDv7 ids sort by creation time, which gives both adapters the same
/// tie-break order for rows created in the same instant. Owner ids are
/// random (v4, or `gen_random_uuid()` in PostgreSQL).
pub(crate) fn new_row_id() -> Uuid {
    Uuid::now_v7()
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Liveness check for the health endpoint.
    async fn ping(&self) -> bool;

    // --- Credentials ---
    async fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>>;

    async fn create_owner(
        &self,
        username: &str,
        display_name: Option<&str>,
        password_hash: &str,
    ) -> StoreResult<OwnerId>;

    // --- Clients ---
    async fn create_client(&self, owner: &OwnerId, input: &NewClient) -> StoreResult<Client>;

    async fn list_clients(&self, owner: &OwnerId) -> StoreResult<Vec<Client>>;

    async fn get_client(&self, owner: &OwnerId, client_id: Uuid) -> StoreResult<Client>;

    async fn update_client(
        &self,
        owner: &OwnerId,
        client_id: Uuid,
        input: &ClientUpdate,
    ) -> StoreResult<Client>;

    /// Deletes the client and, by cascade, its sessions, reports, photos and
    /// share links.
    async fn delete_client(&self, owner: &OwnerId, client_id: Uuid) -> StoreResult<()>;

    // --- Lesson sessions ---
    /// Fails with `NotFound` unless `input.client_id` belongs to `owner`.
    async fn create_session(
        &self,
        owner: &OwnerId,
        input: &NewLessonSession,
    ) -> StoreResult<LessonSession>;

    async fn list_sessions(
        &self,
        owner: &OwnerId,
        client_id: Option<Uuid>,
    ) -> StoreResult<Vec<LessonSession>>;

    async fn get_session(&self, owner: &OwnerId, session_id: Uuid) -> StoreResult<LessonSession>;

    async fn delete_session(&self, owner: &OwnerId, session_id: Uuid) -> StoreResult<()>;

    // --- Reports ---
    /// Fails with `NotFound` unless the session belongs to `owner`, and with
    /// `Conflict` if the session already has a report.
    async fn create_report(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
        input: &NewReport,
    ) -> StoreResult<Report>;

    async fn get_report(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Report>;

    async fn get_report_for_session(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
    ) -> StoreResult<Report>;

    async fn list_reports(&self, owner: &OwnerId) -> StoreResult<Vec<Report>>;

    async fn update_report(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        input: &ReportUpdate,
    ) -> StoreResult<Report>;

    // --- Photos ---
    async fn add_photo(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        input: &NewPhoto,
    ) -> StoreResult<Photo>;

    async fn list_photos(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<Photo>>;

    async fn get_photo(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        photo_id: Uuid,
    ) -> StoreResult<Photo>;

    // --- Share links ---
    /// Point the owner's latest non-revoked link for the report at a new
    /// token (resetting its expiry, view count, last view and revoked flag),
    /// or insert a new link if there is none.
    async fn upsert_share(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<ShareLink>;

    async fn list_shares(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<ShareLink>>;

    /// Revoke every non-revoked link of the report. Returns how many changed.
    async fn revoke_shares(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Anonymous open. The validity check, view-count increment and
    /// last-viewed update happen as one atomic step.
    ///
    /// `NotFound` for an unknown hash, `Gone` for revoked or expired links.
    async fn open_share(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<SharedReport>;

    /// Anonymous photo lookup through a share link. Re-checks validity on
    /// every call without counting a view.
    async fn shared_photo(
        &self,
        token_hash: &str,
        photo_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Photo>;

    // --- Reminders ---
    /// Mark up to `limit` due homework reminders as sent and return them.
    /// A reminder is returned by at most one call.
    async fn claim_due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<DueReminder>>;
}
