//! API server configuration.

use std::path::PathBuf;

use pilates_core::auth::jwt::{DEFAULT_TOKEN_TTL_MINUTES, resolve_jwt_secret};

/// Default interval between homework reminder scans.
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 60;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access token lifetime.
    pub token_ttl_minutes: i64,
    /// Base URL used to build share links.
    pub public_base_url: String,
    /// Directory holding photo files.
    pub photo_dir: PathBuf,
    pub reminder_interval_secs: u64,
    /// Where to POST due reminders. `None` logs them instead.
    pub reminder_webhook_url: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                          |
    /// |------------------------------|----------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:3100`                 |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/pilates` |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file    |
    /// | `TOKEN_TTL_MINUTES`          | `120`                            |
    /// | `PUBLIC_BASE_URL`            | `http://localhost:3100`          |
    /// | `PHOTO_DIR`                  | `<data dir>/pilates/photos`      |
    /// | `REMINDER_INTERVAL_SECS`     | `60`                             |
    /// | `REMINDER_WEBHOOK_URL`       | unset                            |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/pilates".into()),
            jwt_secret: resolve_jwt_secret(),
            token_ttl_minutes: env_parse("TOKEN_TTL_MINUTES").unwrap_or(DEFAULT_TOKEN_TTL_MINUTES),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3100".into()),
            photo_dir: std::env::var("PHOTO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_photo_dir()),
            reminder_interval_secs: env_parse("REMINDER_INTERVAL_SECS")
                .unwrap_or(DEFAULT_REMINDER_INTERVAL_SECS),
            reminder_webhook_url: std::env::var("REMINDER_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// `<data dir>/pilates/photos`, falling back to `./photos`.
pub fn default_photo_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("pilates").join("photos"))
        .unwrap_or_else(|| PathBuf::from("photos"))
}
