//! Request and response bodies. All JSON uses camelCase.

use chrono::{DateTime, NaiveDate, Utc};
use pilates_core::models::domain::{
    Client, LessonSession, Photo, Report, ShareLink, SharedReport,
};
use pilates_core::shares::MintedShare;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub db_connected: bool,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for ClientResponse {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone,
            email: c.email,
            notes: c.notes,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListQuery {
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub session_date: NaiveDate,
    pub duration_minutes: Option<i32>,
    pub focus: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LessonSession> for SessionResponse {
    fn from(s: LessonSession) -> Self {
        Self {
            id: s.id,
            client_id: s.client_id,
            session_date: s.session_date,
            duration_minutes: s.duration_minutes,
            focus: s.focus,
            notes: s.notes,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: Uuid,
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

impl From<Report> for ReportResponse {
    fn from(r: Report) -> Self {
        Self {
            id: r.id,
            session_id: r.session_id,
            summary: r.summary,
            strengths: r.strengths,
            improvements: r.improvements,
            next_goals: r.next_goals,
            homework: r.homework,
            homework_remind_at: r.homework_remind_at,
            homework_reminded_at: r.homework_reminded_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    pub id: Uuid,
    pub report_id: Uuid,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Photo> for PhotoResponse {
    fn from(p: Photo) -> Self {
        Self {
            id: p.id,
            report_id: p.report_id,
            content_type: p.content_type,
            size_bytes: p.size_bytes,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub expire_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareResponse {
    pub token: String,
    pub share_url: String,
    pub expires_at: DateTime<Utc>,
}

impl From<MintedShare> for CreateShareResponse {
    fn from(m: MintedShare) -> Self {
        Self {
            token: m.token,
            share_url: m.share_url,
            expires_at: m.expires_at,
        }
    }
}

/// Share link metadata. Tokens are never listed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkInfo {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub view_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ShareLink> for ShareLinkInfo {
    fn from(l: ShareLink) -> Self {
        Self {
            id: l.id,
            expires_at: l.expires_at,
            revoked: l.revoked,
            view_count: l.view_count,
            last_viewed_at: l.last_viewed_at,
            created_at: l.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShareLinkListResponse {
    pub shares: Vec<ShareLinkInfo>,
}

#[derive(Debug, Serialize)]
pub struct RevokeSharesResponse {
    pub revoked: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedReportResponse {
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
}

impl From<SharedReport> for SharedReportResponse {
    fn from(s: SharedReport) -> Self {
        Self {
            client_name: s.client_name,
            session_date: s.session_date,
            summary: s.summary,
            strengths: s.strengths,
            improvements: s.improvements,
            next_goals: s.next_goals,
            homework: s.homework,
            photo_ids: s.photo_ids,
            expires_at: s.expires_at,
            view_count: s.view_count,
        }
    }
}
