//! Pilates studio API server binary.
//!
//! Serves the REST API over PostgreSQL (or in-memory storage with
//! `--in-memory`) and runs the homework reminder poller alongside it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pilates_api::config::ApiConfig;
use pilates_core::auth::{AuthError, seed_owner};
use pilates_core::photos::{LocalPhotoStorage, MemoryPhotoStorage, PhotoStorage};
use pilates_core::reminders::{LogNotifier, ReminderNotifier, ReminderService, WebhookNotifier};
use pilates_core::store::memory::MemoryStore;
use pilates_core::store::postgres::PgStore;
use pilates_core::store::{Store, StoreError};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server. Unset flags fall back to the
/// environment (see `ApiConfig::from_env`).
#[derive(Parser, Debug)]
#[command(name = "pilates_server", about = "Pilates studio API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep everything in memory instead of PostgreSQL and the photo dir.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Directory for uploaded photos.
    #[arg(long, env = "PHOTO_DIR")]
    photo_dir: Option<PathBuf>,

    /// Seconds between homework reminder scans (0 disables the poller).
    #[arg(long, env = "REMINDER_INTERVAL_SECS")]
    reminder_interval: Option<u64>,

    /// Create this owner at startup if it does not exist yet.
    #[arg(long, env = "SEED_USERNAME", requires = "seed_password")]
    seed_username: Option<String>,

    #[arg(long, env = "SEED_PASSWORD", hide_env_values = true)]
    seed_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pilates_api=debug,pilates_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }
    if let Some(dir) = args.photo_dir {
        config.photo_dir = dir;
    }
    if let Some(secs) = args.reminder_interval {
        config.reminder_interval_secs = secs;
    }

    info!(bind_addr = %config.bind_addr, in_memory = args.in_memory, "starting pilates_server");

    let (store, storage): (Arc<dyn Store>, Arc<dyn PhotoStorage>) = if args.in_memory {
        warn!("in-memory mode: all data is lost on exit");
        (
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryPhotoStorage::new()),
        )
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        let store = PgStore::migrated(pool).await?;

        info!(photo_dir = %config.photo_dir.display(), "using local photo storage");
        (
            Arc::new(store),
            Arc::new(LocalPhotoStorage::new(config.photo_dir.clone())),
        )
    };

    if let (Some(username), Some(password)) = (&args.seed_username, &args.seed_password) {
        match seed_owner(store.as_ref(), username, password, None).await {
            Ok(_) => {}
            Err(AuthError::Store(StoreError::Conflict(_))) => {
                info!(username = %username, "seed owner already exists");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let cancel = CancellationToken::new();

    let poller = if config.reminder_interval_secs > 0 {
        let notifier: Arc<dyn ReminderNotifier> = match &config.reminder_webhook_url {
            Some(url) => {
                info!(url = %url, "delivering reminders via webhook");
                Arc::new(WebhookNotifier::new(url.clone()))
            }
            None => Arc::new(LogNotifier),
        };
        let service = ReminderService::new(store.clone(), notifier);
        Some(service.spawn_poller(
            Duration::from_secs(config.reminder_interval_secs),
            cancel.clone(),
        ))
    } else {
        info!("reminder poller disabled");
        None
    };

    let state = pilates_api::AppState::new(store, storage, config.clone())?;
    let app = pilates_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    let api_result = axum::serve(listener, app)
        .with_graceful_shutdown({
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
                    _ = cancel.cancelled() => {}
                }
            }
        })
        .await;

    // Stop the poller once the API is down.
    cancel.cancel();
    if let Some(handle) = poller {
        let _ = handle.await;
    }

    api_result?;

    Ok(())
}
