//! In-memory [`Store`] used by tests and `--in-memory` server runs.
//!
//! All state sits behind one `tokio::sync::Mutex`, so every operation
//! (including the share open check-and-increment) is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::auth::{Credential, OwnerId};
use crate::models::domain::{
    Client, ClientUpdate, DueReminder, LessonSession, NewClient, NewLessonSession, NewPhoto,
    NewReport, Photo, Report, ReportUpdate, ShareLink, SharedReport,
};
use super::new_row_id;

struct ShareRow {
    link: ShareLink,
    token_hash: String,
}

#[derive(Default)]
struct Inner {
    credentials: HashMap<String, Credential>,
    clients: HashMap<Uuid, Client>,
    sessions: HashMap<Uuid, LessonSession>,
    reports: HashMap<Uuid, Report>,
    photos: Vec<Photo>,
    /// Insertion order; the last matching row is the latest.
    shares: Vec<ShareRow>,
}

impl Inner {
    fn client(&self, owner: &OwnerId, id: Uuid) -> StoreResult<&Client> {
        self.clients
            .get(&id)
            .filter(|c| c.owner_id == *owner.as_uuid())
            .ok_or_else(|| StoreError::NotFound(format!("client {id}")))
    }

    fn session(&self, owner: &OwnerId, id: Uuid) -> StoreResult<&LessonSession> {
        self.sessions
            .get(&id)
            .filter(|s| s.owner_id == *owner.as_uuid())
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }

    fn report(&self, owner: &OwnerId, id: Uuid) -> StoreResult<&Report> {
        self.reports
            .get(&id)
            .filter(|r| r.owner_id == *owner.as_uuid())
            .ok_or_else(|| StoreError::NotFound(format!("report {id}")))
    }

    fn report_mut(&mut self, owner: &OwnerId, id: Uuid) -> StoreResult<&mut Report> {
        self.reports
            .get_mut(&id)
            .filter(|r| r.owner_id == *owner.as_uuid())
            .ok_or_else(|| StoreError::NotFound(format!("report {id}")))
    }

    /// Share row for a token hash, failing `Gone` when it is no longer valid.
    fn valid_share(&mut self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<&mut ShareLink> {
        let row = self
            .shares
            .iter_mut()
            .find(|row| row.token_hash == token_hash)
            .ok_or_else(|| StoreError::NotFound("share link".into()))?;
        if !row.link.is_valid_at(now) {
            return Err(StoreError::Gone("share link revoked or expired".into()));
        }
        Ok(&mut row.link)
    }

    fn remove_session_cascade(&mut self, session_id: Uuid) {
        self.sessions.remove(&session_id);
        let report_ids: Vec<Uuid> = self
            .reports
            .values()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.id)
            .collect();
        for report_id in report_ids {
            self.reports.remove(&report_id);
            self.photos.retain(|p| p.report_id != report_id);
            self.shares.retain(|s| s.link.report_id != report_id);
        }
    }
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>> {
        Ok(self.inner.lock().await.credentials.get(username).cloned())
    }

    async fn create_owner(
        &self,
        username: &str,
        _display_name: Option<&str>,
        password_hash: &str,
    ) -> StoreResult<OwnerId> {
        let mut inner = self.inner.lock().await;
        if inner.credentials.contains_key(username) {
            return Err(StoreError::Conflict(format!("username '{username}' is taken")));
        }
        let owner_id = OwnerId::new(Uuid::new_v4());
        inner.credentials.insert(
            username.to_string(),
            Credential {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                owner_id,
            },
        );
        Ok(owner_id)
    }

    async fn create_client(&self, owner: &OwnerId, input: &NewClient) -> StoreResult<Client> {
        let now = Utc::now();
        let client = Client {
            id: new_row_id(),
            owner_id: *owner.as_uuid(),
            name: input.name.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .clients
            .insert(client.id, client.clone());
        Ok(client)
    }

    async fn list_clients(&self, owner: &OwnerId) -> StoreResult<Vec<Client>> {
        let inner = self.inner.lock().await;
        let mut clients: Vec<Client> = inner
            .clients
            .values()
            .filter(|c| c.owner_id == *owner.as_uuid())
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(clients)
    }

    async fn get_client(&self, owner: &OwnerId, client_id: Uuid) -> StoreResult<Client> {
        self.inner.lock().await.client(owner, client_id).cloned()
    }

    async fn update_client(
        &self,
        owner: &OwnerId,
        client_id: Uuid,
        input: &ClientUpdate,
    ) -> StoreResult<Client> {
        let mut inner = self.inner.lock().await;
        inner.client(owner, client_id)?;
        let client = inner
            .clients
            .get_mut(&client_id)
            .ok_or_else(|| StoreError::NotFound(format!("client {client_id}")))?;
        if let Some(name) = &input.name {
            client.name = name.clone();
        }
        if let Some(phone) = &input.phone {
            client.phone = Some(phone.clone());
        }
        if let Some(email) = &input.email {
            client.email = Some(email.clone());
        }
        if let Some(notes) = &input.notes {
            client.notes = Some(notes.clone());
        }
        client.updated_at = Utc::now();
        Ok(client.clone())
    }

    async fn delete_client(&self, owner: &OwnerId, client_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.client(owner, client_id)?;
        inner.clients.remove(&client_id);
        let session_ids: Vec<Uuid> = inner
            .sessions
            .values()
            .filter(|s| s.client_id == client_id)
            .map(|s| s.id)
            .collect();
        for session_id in session_ids {
            inner.remove_session_cascade(session_id);
        }
        Ok(())
    }

    async fn create_session(
        &self,
        owner: &OwnerId,
        input: &NewLessonSession,
    ) -> StoreResult<LessonSession> {
        let mut inner = self.inner.lock().await;
        inner.client(owner, input.client_id)?;
        let session = LessonSession {
            id: new_row_id(),
            owner_id: *owner.as_uuid(),
            client_id: input.client_id,
            session_date: input.session_date,
            duration_minutes: input.duration_minutes,
            focus: input.focus.clone(),
            notes: input.notes.clone(),
            created_at: Utc::now(),
        };
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn list_sessions(
        &self,
        owner: &OwnerId,
        client_id: Option<Uuid>,
    ) -> StoreResult<Vec<LessonSession>> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<LessonSession> = inner
            .sessions
            .values()
            .filter(|s| s.owner_id == *owner.as_uuid())
            .filter(|s| client_id.is_none_or(|c| s.client_id == c))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.session_date
                .cmp(&a.session_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(sessions)
    }

    async fn get_session(&self, owner: &OwnerId, session_id: Uuid) -> StoreResult<LessonSession> {
        self.inner.lock().await.session(owner, session_id).cloned()
    }

    async fn delete_session(&self, owner: &OwnerId, session_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.session(owner, session_id)?;
        inner.remove_session_cascade(session_id);
        Ok(())
    }

    async fn create_report(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
        input: &NewReport,
    ) -> StoreResult<Report> {
        let mut inner = self.inner.lock().await;
        inner.session(owner, session_id)?;
        if inner.reports.values().any(|r| r.session_id == session_id) {
            return Err(StoreError::Conflict(format!(
                "session {session_id} already has a report"
            )));
        }
        let now = Utc::now();
        let report = Report {
            id: new_row_id(),
            owner_id: *owner.as_uuid(),
            session_id,
            summary: input.summary.clone(),
            strengths: input.strengths.clone(),
            improvements: input.improvements.clone(),
            next_goals: input.next_goals.clone(),
            homework: input.homework.clone(),
            homework_remind_at: input.homework_remind_at,
            homework_reminded_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.reports.insert(report.id, report.clone());
        Ok(report)
    }

    async fn get_report(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Report> {
        self.inner.lock().await.report(owner, report_id).cloned()
    }

    async fn get_report_for_session(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
    ) -> StoreResult<Report> {
        let inner = self.inner.lock().await;
        inner
            .reports
            .values()
            .find(|r| r.session_id == session_id && r.owner_id == *owner.as_uuid())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("report for session {session_id}")))
    }

    async fn list_reports(&self, owner: &OwnerId) -> StoreResult<Vec<Report>> {
        let inner = self.inner.lock().await;
        let mut reports: Vec<Report> = inner
            .reports
            .values()
            .filter(|r| r.owner_id == *owner.as_uuid())
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(reports)
    }

    async fn update_report(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        input: &ReportUpdate,
    ) -> StoreResult<Report> {
        let mut inner = self.inner.lock().await;
        let report = inner.report_mut(owner, report_id)?;
        input.validate_against(report.homework.as_deref())?;
        if let Some(summary) = &input.summary {
            report.summary = summary.clone();
        }
        if let Some(strengths) = &input.strengths {
            report.strengths = Some(strengths.clone());
        }
        if let Some(improvements) = &input.improvements {
            report.improvements = Some(improvements.clone());
        }
        if let Some(next_goals) = &input.next_goals {
            report.next_goals = Some(next_goals.clone());
        }
        if let Some(homework) = &input.homework {
            report.homework = Some(homework.clone());
        }
        if let Some(remind_at) = input.homework_remind_at {
            report.homework_remind_at = Some(remind_at);
            report.homework_reminded_at = None;
        }
        report.updated_at = Utc::now();
        Ok(report.clone())
    }

    async fn add_photo(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        input: &NewPhoto,
    ) -> StoreResult<Photo> {
        let mut inner = self.inner.lock().await;
        inner.report(owner, report_id)?;
        let photo = Photo {
            id: new_row_id(),
            owner_id: *owner.as_uuid(),
            report_id,
            locator: input.locator.clone(),
            content_type: input.content_type.clone(),
            size_bytes: input.size_bytes,
            created_at: Utc::now(),
        };
        inner.photos.push(photo.clone());
        Ok(photo)
    }

    async fn list_photos(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<Photo>> {
        let inner = self.inner.lock().await;
        inner.report(owner, report_id)?;
        Ok(inner
            .photos
            .iter()
            .filter(|p| p.report_id == report_id)
            .cloned()
            .collect())
    }

    async fn get_photo(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        photo_id: Uuid,
    ) -> StoreResult<Photo> {
        let inner = self.inner.lock().await;
        inner
            .photos
            .iter()
            .find(|p| {
                p.id == photo_id && p.report_id == report_id && p.owner_id == *owner.as_uuid()
            })
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("photo {photo_id}")))
    }

    async fn upsert_share(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<ShareLink> {
        let mut inner = self.inner.lock().await;
        inner.report(owner, report_id)?;

        let latest = inner.shares.iter_mut().rev().find(|row| {
            row.link.report_id == report_id
                && row.link.owner_id == *owner.as_uuid()
                && !row.link.revoked
        });

        if let Some(row) = latest {
            row.token_hash = token_hash.to_string();
            row.link.expires_at = expires_at;
            row.link.view_count = 0;
            row.link.last_viewed_at = None;
            row.link.revoked = false;
            row.link.updated_at = now;
            return Ok(row.link.clone());
        }

        let link = ShareLink {
            id: new_row_id(),
            owner_id: *owner.as_uuid(),
            report_id,
            expires_at,
            revoked: false,
            view_count: 0,
            last_viewed_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.shares.push(ShareRow {
            link: link.clone(),
            token_hash: token_hash.to_string(),
        });
        Ok(link)
    }

    async fn list_shares(&self, owner: &OwnerId, report_id: Uuid) -> StoreResult<Vec<ShareLink>> {
        let inner = self.inner.lock().await;
        inner.report(owner, report_id)?;
        Ok(inner
            .shares
            .iter()
            .rev()
            .filter(|row| row.link.report_id == report_id)
            .map(|row| row.link.clone())
            .collect())
    }

    async fn revoke_shares(
        &self,
        owner: &OwnerId,
        report_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.report(owner, report_id)?;
        let mut revoked = 0;
        for row in inner
            .shares
            .iter_mut()
            .filter(|row| row.link.report_id == report_id && !row.link.revoked)
        {
            row.link.revoked = true;
            row.link.updated_at = now;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn open_share(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<SharedReport> {
        let mut inner = self.inner.lock().await;
        let link = inner.valid_share(token_hash, now)?;
        link.view_count += 1;
        link.last_viewed_at = Some(now);
        link.updated_at = now;
        let link = link.clone();

        let report = inner
            .reports
            .get(&link.report_id)
            .ok_or_else(|| StoreError::Internal("share link without report".into()))?;
        let session = inner
            .sessions
            .get(&report.session_id)
            .ok_or_else(|| StoreError::Internal("report without session".into()))?;
        let client = inner
            .clients
            .get(&session.client_id)
            .ok_or_else(|| StoreError::Internal("session without client".into()))?;
        let photo_ids = inner
            .photos
            .iter()
            .filter(|p| p.report_id == report.id)
            .map(|p| p.id)
            .collect();

        Ok(SharedReport {
            report_id: report.id,
            client_name: client.name.clone(),
            session_date: session.session_date,
            summary: report.summary.clone(),
            strengths: report.strengths.clone(),
            improvements: report.improvements.clone(),
            next_goals: report.next_goals.clone(),
            homework: report.homework.clone(),
            photo_ids,
            expires_at: link.expires_at,
            view_count: link.view_count,
            last_viewed_at: link.last_viewed_at,
        })
    }

    async fn shared_photo(
        &self,
        token_hash: &str,
        photo_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Photo> {
        let mut inner = self.inner.lock().await;
        let report_id = inner.valid_share(token_hash, now)?.report_id;
        inner
            .photos
            .iter()
            .find(|p| p.id == photo_id && p.report_id == report_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("photo {photo_id}")))
    }

    async fn claim_due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<DueReminder>> {
        let mut inner = self.inner.lock().await;
        let mut due: Vec<(DateTime<Utc>, Uuid)> = inner
            .reports
            .values()
            .filter(|r| r.homework.is_some() && r.homework_reminded_at.is_none())
            .filter_map(|r| r.homework_remind_at.filter(|at| *at <= now).map(|at| (at, r.id)))
            .collect();
        due.sort();
        due.truncate(usize::try_from(limit).unwrap_or(0));

        let mut claimed = Vec::with_capacity(due.len());
        for (remind_at, report_id) in due {
            let Some(report) = inner.reports.get_mut(&report_id) else {
                continue;
            };
            report.homework_reminded_at = Some(now);
            let homework = report.homework.clone().unwrap_or_default();
            let owner_id = report.owner_id;
            let session_id = report.session_id;

            let client = inner
                .sessions
                .get(&session_id)
                .and_then(|s| inner.clients.get(&s.client_id));
            claimed.push(DueReminder {
                report_id,
                owner_id,
                client_name: client.map(|c| c.name.clone()).unwrap_or_default(),
                client_email: client.and_then(|c| c.email.clone()),
                homework,
                remind_at,
            });
        }
        Ok(claimed)
    }
}
