//! PostgreSQL [`Store`] via sqlx.
//!
//! Owner filters are part of each statement's `WHERE` clause. Dependent
//! inserts select the parent row with the owner filter inside the `INSERT`,
//! so a foreign parent id inserts nothing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, new_row_id};
use crate::models::auth::{Credential, OwnerId};
use crate::models::domain::{
    Client, ClientUpdate, DueReminder, LessonSession, NewClient, NewLessonSession, NewPhoto,
    NewReport, Photo, Report, ReportUpdate, ShareLink, SharedReport,
};

const CLIENT_COLUMNS: &str = "id, owner_id, name, phone, email, notes, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, owner_id, client_id, session_date, duration_minutes, focus, notes, created_at";

const REPORT_COLUMNS: &str = "id, owner_id, session_id, summary, strengths, improvements, \
     next_goals, homework, homework_remind_at, homework_reminded_at, created_at, updated_at";

const PHOTO_COLUMNS: &str =
    "id, owner_id, report_id, locator, content_type, size_bytes, created_at";

const SHARE_COLUMNS: &str = "id, owner_id, report_id, expires_at, revoked, view_count, \
     last_viewed_at, created_at, updated_at";

/// Row returned by the share open statement.
#[derive(sqlx::FromRow)]
struct SharedReportRow {
    report_id: Uuid,
    client_name: String,
    session_date: NaiveDate,
    summary: String,
    strengths: Option<String>,
    improvements: Option<String>,
    next_goals: Option<String>,
    homework: Option<String>,
    expires_at: DateTime<Utc>,
    view_count: i64,
    last_viewed_at: Option<DateTime<Utc>>,
}

/// Schema migrations embedded from `pilates_core/migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations, then wrap the pool.
    pub async fn migrated(pool: PgPool) -> Result<Self, MigrateError> {
        MIGRATOR.run(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `NotFound` when an unknown share hash, `Gone` when known but invalid.
    async fn classify_share_miss(&self, token_hash: &str) -> StoreError {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM share_links WHERE token_hash = $1)",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await;
        match exists {
            Ok(true) => StoreError::Gone("share link revoked or expired".into()),
            Ok(false) => StoreError::NotFound("share link".into()),
            Err(e) => StoreError::Db(e),
        }
    }
}

fn not_found(what: &str, id: Uuid) -> impl FnOnce() -> StoreError + '_ {
    move || StoreError::NotFound(format!("{what} {id}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>> {
        let row = sqlx::query_as::<_, (String, String, Uuid)>(
            "SELECT username, password_hash, owner_id FROM credentials WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(username, password_hash, owner_id)| Credential {
            username,
            password_hash,
            owner_id: OwnerId::new(owner_id),
        }))
    }

    async fn create_owner(
        &self,
        username: &str,
        display_name: Option<&str>,
        password_hash: &str,
    ) -> StoreResult<OwnerId> {
        let mut tx = self.pool.begin().await?;

        let owner_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO owners (display_name) VALUES ($1) RETURNING id",
        )
        .bind(display_name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO credentials (username, password_hash, owner_id) VALUES ($1, $2, $3)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(owner_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("username '{username}' is taken"))
            } else {
                StoreError::Db(e)
            }
        })?;

        tx.commit().await?;
        Ok(OwnerId::new(owner_id))
    }

    async fn create_client(&self, owner: &OwnerId, input: &NewClient) -> StoreResult<Client> {
        let sql = format!(
            "INSERT INTO clients (id, owner_id, name, phone, email, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {CLIENT_COLUMNS}"
        );
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(new_row_id())
            .bind(owner.as_uuid())
            .bind(&input.name)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(&input.notes)
            .fetch_one(&self.pool)
            .await?;
        Ok(client)
    }

    async fn list_clients(&self, owner: &OwnerId) -> StoreResult<Vec<Client>> {
        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE owner_id = $1 ORDER BY name, id"
        );
        let rows = sqlx::query_as::<_, Client>(&sql)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_client(&self, owner: &OwnerId, client_id: Uuid) -> StoreResult<Client> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Client>(&sql)
            .bind(client_id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("client", client_id))
    }

    async fn update_client(
        &self,
        owner: &OwnerId,
        client_id: Uuid,
        input: &ClientUpdate,
    ) -> StoreResult<Client> {
        let sql = format!(
            "UPDATE clients SET \
               name = COALESCE($3, name), \
               phone = COALESCE($4, phone), \
               email = COALESCE($5, email), \
               notes = COALESCE($6, notes), \
               updated_at = now() \
             WHERE id = $1 AND owner_id = $2 \
             RETURNING {CLIENT_COLUMNS}"
        );
        sqlx::query_as::<_, Client>(&sql)
            .bind(client_id)
            .bind(owner.as_uuid())
            .bind(&input.name)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(&input.notes)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("client", client_id))
    }

    async fn delete_client(&self, owner: &OwnerId, client_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND owner_id = $2")
            .bind(client_id)
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("client", client_id)());
        }
        Ok(())
    }

    async fn create_session(
        &self,
        owner: &OwnerId,
        input: &NewLessonSession,
    ) -> StoreResult<LessonSession> {
        let sql = format!(
            "INSERT INTO lesson_sessions \
               (id, owner_id, client_id, session_date, duration_minutes, focus, notes) \
             SELECT $1, c.owner_id, c.id, $4, $5, $6, $7 \
             FROM clients c WHERE c.id = $2 AND c.owner_id = $3 \
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, LessonSession>(&sql)
            .bind(new_row_id())
            .bind(input.client_id)
            .bind(owner.as_uuid())
            .bind(input.session_date)
            .bind(input.duration_minutes)
            .bind(&input.focus)
            .bind(&input.notes)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("client", input.client_id))
    }

    async fn list_sessions(
        &self,
        owner: &OwnerId,
        client_id: Option<Uuid>,
    ) -> StoreResult<Vec<LessonSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM lesson_sessions \
             WHERE owner_id = $1 AND ($2::uuid IS NULL OR client_id = $2) \
             ORDER BY session_date DESC, created_at DESC"
        );
        let rows = sqlx::query_as::<_, LessonSession>(&sql)
            .bind(owner.as_uuid())
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_session(&self, owner: &OwnerId, session_id: Uuid) -> StoreResult<LessonSession> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM lesson_sessions WHERE id = $1 AND owner_id = $2"
        );
        sqlx::query_as::<_, LessonSession>(&sql)
            .bind(session_id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("session", session_id))
    }

    async fn delete_session(&self, owner: &OwnerId, session_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM lesson_sessions WHERE id = $1 AND owner_id = $2")
            .bind(session_id)
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("session", session_id)());
        }
        Ok(())
    }

    async fn create_report(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
        input: &NewReport,
    ) -> StoreResult<Report> {
        let sql = format!(
            "INSERT INTO reports \
               (id, owner_id, session_id, summary, strengths, improvements, next_goals, \
                homework, homework_remind_at) \
             SELECT $1, s.owner_id, s.id, $4, $5, $6, $7, $8, $9 \
             FROM lesson_sessions s WHERE s.id = $2 AND s.owner_id = $3 \
             RETURNING {REPORT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Report>(&sql)
            .bind(new_row_id())
            .bind(session_id)
            .bind(owner.as_uuid())
            .bind(&input.summary)
            .bind(&input.strengths)
            .bind(&input.improvements)
            .bind(&input.next_goals)
            .bind(&input.homework)
            .bind(input.homework_remind_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("session {session_id} already has a report"))
                } else {
                    StoreError::Db(e)
                }
            })?;
        row.ok_or_else(not_found("session", session_id))
    }

    async fn get_report(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Report> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Report>(&sql)
            .bind(report_id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("report", report_id))
    }

    async fn get_report_for_session(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
    ) -> StoreResult<Report> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE session_id = $1 AND owner_id = $2"
        );
        sqlx::query_as::<_, Report>(&sql)
            .bind(session_id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("report for session", session_id))
    }

    async fn list_reports(&self, owner: &OwnerId) -> StoreResult<Vec<Report>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, Report>(&sql)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_report(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        input: &ReportUpdate,
    ) -> StoreResult<Report> {
        let sql = format!(
            "UPDATE reports SET \
               summary = COALESCE($3, summary), \
               strengths = COALESCE($4, strengths), \
               improvements = COALESCE($5, improvements), \
               next_goals = COALESCE($6, next_goals), \
               homework = COALESCE($7, homework), \
               homework_remind_at = COALESCE($8, homework_remind_at), \
               homework_reminded_at = CASE WHEN $8::timestamptz IS NULL \
                   THEN homework_reminded_at ELSE NULL END, \
               updated_at = now() \
             WHERE id = $1 AND owner_id = $2 \
               AND ($8::timestamptz IS NULL \
                    OR NULLIF(btrim(COALESCE($7, homework)), '') IS NOT NULL) \
             RETURNING {REPORT_COLUMNS}"
        );
        input.validate()?;
        let updated = sqlx::query_as::<_, Report>(&sql)
            .bind(report_id)
            .bind(owner.as_uuid())
            .bind(&input.summary)
            .bind(&input.strengths)
            .bind(&input.improvements)
            .bind(&input.next_goals)
            .bind(&input.homework)
            .bind(input.homework_remind_at)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(report) = updated {
            return Ok(report);
        }

        // No row: either not the caller's report, or a reminder without homework.
        let current = sqlx::query_scalar::<_, Option<String>>(
            "SELECT homework FROM reports WHERE id = $1 AND owner_id = $2",
        )
        .bind(report_id)
        .bind(owner.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(not_found("report", report_id))?;
        input.validate_against(current.as_deref())?;
        Err(StoreError::Internal(format!("report {report_id} update matched no row")))
    }

    async fn add_photo(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        input: &NewPhoto,
    ) -> StoreResult<Photo> {
        let sql = format!(
            "INSERT INTO photos (id, owner_id, report_id, locator, content_type, size_bytes) \
             SELECT $1, r.owner_id, r.id, $4, $5, $6 \
             FROM reports r WHERE r.id = $2 AND r.owner_id = $3 \
             RETURNING {PHOTO_COLUMNS}"
        );
        sqlx::query_as::<_, Photo>(&sql)
            .bind(new_row_id())
            .bind(report_id)
            .bind(owner.as_uuid())
            .bind(&input.locator)
            .bind(&input.content_type)
            .bind(input.size_bytes)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("report", report_id))
    }

    async fn list_photos(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<Photo>> {
        // Distinguish "no photos" from "not your report".
        self.get_report(owner, report_id).await?;
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos \
             WHERE report_id = $1 AND owner_id = $2 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, Photo>(&sql)
            .bind(report_id)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_photo(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        photo_id: Uuid,
    ) -> StoreResult<Photo> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos \
             WHERE id = $1 AND report_id = $2 AND owner_id = $3"
        );
        sqlx::query_as::<_, Photo>(&sql)
            .bind(photo_id)
            .bind(report_id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("photo", photo_id))
    }

    async fn upsert_share(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<ShareLink> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reports WHERE id = $1 AND owner_id = $2)",
        )
        .bind(report_id)
        .bind(owner.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        if !owned {
            return Err(not_found("report", report_id)());
        }

        let latest = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM share_links \
             WHERE report_id = $1 AND owner_id = $2 AND NOT revoked \
             ORDER BY created_at DESC, id DESC LIMIT 1 \
             FOR UPDATE",
        )
        .bind(report_id)
        .bind(owner.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let link = match latest {
            Some(link_id) => {
                let sql = format!(
                    "UPDATE share_links SET \
                       token_hash = $2, expires_at = $3, view_count = 0, \
                       last_viewed_at = NULL, revoked = false, updated_at = $4 \
                     WHERE id = $1 \
                     RETURNING {SHARE_COLUMNS}"
                );
                sqlx::query_as::<_, ShareLink>(&sql)
                    .bind(link_id)
                    .bind(token_hash)
                    .bind(expires_at)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
            }
            None => {
                let sql = format!(
                    "INSERT INTO share_links \
                       (id, owner_id, report_id, token_hash, expires_at, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $6) \
                     RETURNING {SHARE_COLUMNS}"
                );
                sqlx::query_as::<_, ShareLink>(&sql)
                    .bind(new_row_id())
                    .bind(owner.as_uuid())
                    .bind(report_id)
                    .bind(token_hash)
                    .bind(expires_at)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;
        Ok(link)
    }

    async fn list_shares(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<ShareLink>> {
        self.get_report(owner, report_id).await?;
        let sql = format!(
            "SELECT {SHARE_COLUMNS} FROM share_links \
             WHERE report_id = $1 AND owner_id = $2 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ShareLink>(&sql)
            .bind(report_id)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn revoke_shares(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.get_report(owner, report_id).await?;
        let result = sqlx::query(
            "UPDATE share_links SET revoked = true, updated_at = $3 \
             WHERE report_id = $1 AND owner_id = $2 AND NOT revoked",
        )
        .bind(report_id)
        .bind(owner.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn open_share(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<SharedReport> {
        // The validity predicate and the increment are one UPDATE, so a
        // concurrent revoke or expiry can never slip between them.
        let row = sqlx::query_as::<_, SharedReportRow>(
            r#"
            WITH hit AS (
                UPDATE share_links
                SET view_count = view_count + 1, last_viewed_at = $2, updated_at = $2
                WHERE token_hash = $1 AND NOT revoked AND expires_at > $2
                RETURNING report_id, expires_at, view_count, last_viewed_at
            )
            SELECT r.id AS report_id, c.name AS client_name, s.session_date,
                   r.summary, r.strengths, r.improvements, r.next_goals, r.homework,
                   hit.expires_at, hit.view_count, hit.last_viewed_at
            FROM hit
            JOIN reports r ON r.id = hit.report_id
            JOIN lesson_sessions s ON s.id = r.session_id
            JOIN clients c ON c.id = s.client_id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(self.classify_share_miss(token_hash).await);
        };

        let photo_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM photos WHERE report_id = $1 ORDER BY created_at, id",
        )
        .bind(row.report_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SharedReport {
            report_id: row.report_id,
            client_name: row.client_name,
            session_date: row.session_date,
            summary: row.summary,
            strengths: row.strengths,
            improvements: row.improvements,
            next_goals: row.next_goals,
            homework: row.homework,
            photo_ids,
            expires_at: row.expires_at,
            view_count: row.view_count,
            last_viewed_at: row.last_viewed_at,
        })
    }

    async fn shared_photo(
        &self,
        token_hash: &str,
        photo_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Photo> {
        let report_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT report_id FROM share_links \
             WHERE token_hash = $1 AND NOT revoked AND expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(report_id) = report_id else {
            return Err(self.classify_share_miss(token_hash).await);
        };

        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1 AND report_id = $2");
        sqlx::query_as::<_, Photo>(&sql)
            .bind(photo_id)
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found("photo", photo_id))
    }

    async fn claim_due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<DueReminder>> {
        let mut tx = self.pool.begin().await?;

        // SKIP LOCKED keeps a second poller from claiming the same rows.
        let rows = sqlx::query_as::<_, DueReminder>(
            r#"
            WITH due AS (
                SELECT id FROM reports
                WHERE homework_remind_at <= $1
                  AND homework_reminded_at IS NULL
                  AND homework IS NOT NULL
                ORDER BY homework_remind_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE reports r
            SET homework_reminded_at = $1
            FROM due, lesson_sessions s, clients c
            WHERE r.id = due.id AND s.id = r.session_id AND c.id = s.client_id
            RETURNING r.id AS report_id, r.owner_id, c.name AS client_name,
                      c.email AS client_email, r.homework, r.homework_remind_at AS remind_at
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows)
    }
}
