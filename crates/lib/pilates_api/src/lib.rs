//! # pilates_api
//!
//! HTTP API library for the Pilates studio backend.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use pilates_core::auth::AuthError;
use pilates_core::auth::jwt::TokenService;
use pilates_core::photos::{MAX_PHOTO_BYTES, PhotoService, PhotoStorage};
use pilates_core::shares::ShareService;
use pilates_core::store::Store;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{auth, clients, health, photos, reports, sessions, shares};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ownership-scoped persistence (PostgreSQL or in-memory).
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub shares: ShareService,
    pub photos: PhotoService,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the services over a store and photo storage.
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn PhotoStorage>,
        config: ApiConfig,
    ) -> Result<Self, AuthError> {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::minutes(config.token_ttl_minutes),
        )?;
        let photos = PhotoService::new(store.clone(), storage);
        let shares = ShareService::new(store.clone(), photos.clone(), &config.public_base_url);
        Ok(Self {
            store,
            tokens,
            shares,
            photos,
            config,
        })
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required). Nothing else is reachable anonymously.
    let public = Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .route(routes::AUTH_LOGIN, post(auth::login_handler))
        .route(routes::SHARE_TOKEN, get(shares::open_share_handler))
        .route(
            routes::SHARE_TOKEN_PHOTOS_PHOTOID,
            get(shares::shared_photo_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route(
            routes::CLIENTS,
            get(clients::list_clients_handler).post(clients::create_client_handler),
        )
        .route(
            routes::CLIENTS_CLIENTID,
            get(clients::get_client_handler)
                .patch(clients::update_client_handler)
                .delete(clients::delete_client_handler),
        )
        .route(
            routes::SESSIONS,
            get(sessions::list_sessions_handler).post(sessions::create_session_handler),
        )
        .route(
            routes::SESSIONS_SESSIONID,
            get(sessions::get_session_handler).delete(sessions::delete_session_handler),
        )
        .route(
            routes::SESSIONS_SESSIONID_REPORT,
            get(reports::get_session_report_handler).post(reports::create_report_handler),
        )
        .route(routes::REPORTS, get(reports::list_reports_handler))
        .route(
            routes::REPORTS_REPORTID,
            get(reports::get_report_handler).patch(reports::update_report_handler),
        )
        .route(
            routes::REPORTS_REPORTID_SHARE,
            post(shares::create_share_handler).delete(shares::revoke_shares_handler),
        )
        .route(
            routes::REPORTS_REPORTID_SHARES,
            get(shares::list_shares_handler),
        )
        .route(
            routes::REPORTS_REPORTID_PHOTOS,
            get(photos::list_photos_handler).post(photos::upload_photo_handler),
        )
        .route(
            routes::REPORTS_REPORTID_PHOTOS_PHOTOID,
            get(photos::get_photo_handler),
        )
        // Raw photo bodies; the extra KiB lets the handler report 413 itself.
        .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + 1024))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
