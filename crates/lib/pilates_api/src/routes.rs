//! Route path constants, one per path. Each doc lists the methods served.

/// GET: liveness and database connectivity.
pub const HEALTH: &str = "/health";

/// POST: exchange credentials for a bearer token.
pub const AUTH_LOGIN: &str = "/auth/login";

/// GET lists the owner's clients, POST creates one.
pub const CLIENTS: &str = "/clients";
/// GET, PATCH, DELETE. Delete cascades to sessions, reports and share links.
pub const CLIENTS_CLIENTID: &str = "/clients/{clientId}";

/// GET (optional `clientId` filter), POST.
pub const SESSIONS: &str = "/sessions";
/// GET, DELETE.
pub const SESSIONS_SESSIONID: &str = "/sessions/{sessionId}";
/// GET, POST. At most one report per session.
pub const SESSIONS_SESSIONID_REPORT: &str = "/sessions/{sessionId}/report";

/// GET.
pub const REPORTS: &str = "/reports";
/// GET, PATCH.
pub const REPORTS_REPORTID: &str = "/reports/{reportId}";

/// POST mints a share link, DELETE revokes all live ones.
pub const REPORTS_REPORTID_SHARE: &str = "/reports/{reportId}/share";
/// GET: share link metadata.
pub const REPORTS_REPORTID_SHARES: &str = "/reports/{reportId}/shares";

/// GET lists photo metadata, POST uploads a raw image body.
pub const REPORTS_REPORTID_PHOTOS: &str = "/reports/{reportId}/photos";
/// GET: photo bytes.
pub const REPORTS_REPORTID_PHOTOS_PHOTOID: &str = "/reports/{reportId}/photos/{photoId}";

/// GET: anonymous report view.
pub const SHARE_TOKEN: &str = "/share/{token}";
/// GET: anonymous photo fetch.
pub const SHARE_TOKEN_PHOTOS_PHOTOID: &str = "/share/{token}/photos/{photoId}";
