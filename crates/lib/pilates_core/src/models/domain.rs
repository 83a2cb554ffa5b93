//! Studio domain models: clients, lesson sessions, reports, photos and
//! share links, plus the inputs used to create or update them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::store::StoreError;

/// Longest accepted client name.
pub const MAX_CLIENT_NAME_LEN: usize = 200;

/// Accepted lesson duration range in minutes.
pub const LESSON_DURATION_RANGE: std::ops::RangeInclusive<i32> = 1..=600;

/// A client of an owner.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Client {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One lesson held with a client.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LessonSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub session_date: NaiveDate,
    pub duration_minutes: Option<i32>,
    pub focus: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The written report for a lesson session. At most one per session.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Report {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub session_id: Uuid,
    pub summary: String,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub next_goals: Option<String>,
    pub homework: Option<String>,
    pub homework_remind_at: Option<DateTime<Utc>>,
    pub homework_reminded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata of a photo attached to a report. The bytes live in photo storage.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub report_id: Uuid,
    pub locator: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// A share link row, without its token hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShareLink {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub report_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub view_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShareLink {
    /// A link is open while it is not revoked and not yet expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

/// Read-only projection of a report served through a share link.
#[derive(Debug, Clone)]
pub struct SharedReport {
    pub report_id: Uuid,
    pub client_name: String,
    pub session_date: NaiveDate,
    pub summary: String,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub next_goals: Option<String>,
    pub homework: Option<String>,
    pub photo_ids: Vec<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub view_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
}

/// A homework reminder claimed by the reminder scan.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct DueReminder {
    pub report_id: Uuid,
    pub owner_id: Uuid,
    pub client_name: String,
    pub client_email: Option<String>,
    pub homework: String,
    pub remind_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl NewClient {
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_client_name(&self.name)
    }
}

/// Partial client update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl ClientUpdate {
    pub fn validate(&self) -> Result<(), StoreError> {
        match &self.name {
            Some(name) => validate_client_name(name),
            None => Ok(()),
        }
    }
}

fn validate_client_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("Client name is required".into()));
    }
    if name.chars().count() > MAX_CLIENT_NAME_LEN {
        return Err(StoreError::Validation(format!(
            "Client name must be at most {MAX_CLIENT_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLessonSession {
    pub client_id: Uuid,
    pub session_date: NaiveDate,
    pub duration_minutes: Option<i32>,
    pub focus: Option<String>,
    pub notes: Option<String>,
}

impl NewLessonSession {
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(minutes) = self.duration_minutes
            && !LESSON_DURATION_RANGE.contains(&minutes)
        {
            return Err(StoreError::Validation(format!(
                "Duration must be between {} and {} minutes",
                LESSON_DURATION_RANGE.start(),
                LESSON_DURATION_RANGE.end()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub summary: String,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub next_goals: Option<String>,
    pub homework: Option<String>,
    pub homework_remind_at: Option<DateTime<Utc>>,
}

impl NewReport {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.summary.trim().is_empty() {
            return Err(StoreError::Validation("Report summary is required".into()));
        }
        validate_reminder(self.homework.as_deref(), self.homework_remind_at)
    }
}

/// Partial report update; `None` leaves a field unchanged. Setting
/// `homework_remind_at` re-arms the reminder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUpdate {
    pub summary: Option<String>,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub next_goals: Option<String>,
    pub homework: Option<String>,
    pub homework_remind_at: Option<DateTime<Utc>>,
}

impl ReportUpdate {
    /// Checks that need only the update itself.
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(summary) = &self.summary
            && summary.trim().is_empty()
        {
            return Err(StoreError::Validation("Report summary is required".into()));
        }
        if self.homework.is_some() {
            validate_reminder(self.homework.as_deref(), self.homework_remind_at)?;
        }
        Ok(())
    }

    /// Checks against the stored report: arming a reminder needs homework
    /// either in this update or already on the report.
    pub fn validate_against(&self, current_homework: Option<&str>) -> Result<(), StoreError> {
        self.validate()?;
        let homework = self.homework.as_deref().or(current_homework);
        validate_reminder(homework, self.homework_remind_at)
    }
}

fn validate_reminder(
    homework: Option<&str>,
    remind_at: Option<DateTime<Utc>>,
) -> Result<(), StoreError> {
    let has_homework = homework.is_some_and(|h| !h.trim().is_empty());
    if remind_at.is_some() && !has_homework {
        return Err(StoreError::Validation(
            "A homework reminder needs homework".into(),
        ));
    }
    Ok(())
}

/// Photo metadata recorded after the bytes are stored.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub locator: String,
    pub content_type: String,
    pub size_bytes: i64,
}
