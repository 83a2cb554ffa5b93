//! Shared helpers for router integration tests: an in-memory app, seeded
//! owners and a small request helper.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use pilates_api::config::ApiConfig;
use pilates_api::{AppState, router};
use pilates_core::auth::seed_owner;
use pilates_core::models::auth::OwnerId;
use pilates_core::photos::MemoryPhotoStorage;
use pilates_core::store::Store;
use pilates_core::store::memory::MemoryStore;
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "hundred-x10";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        jwt_secret: "integration-test-secret-0123456789abcdef".into(),
        token_ttl_minutes: 120,
        public_base_url: "http://studio.test".into(),
        photo_dir: std::env::temp_dir(),
        reminder_interval_secs: 60,
        reminder_webhook_url: None,
    }
}

pub async fn spawn_app() -> TestApp {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let state = AppState::new(store, Arc::new(MemoryPhotoStorage::new()), test_config())
        .expect("app state");
    TestApp {
        app: router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn seed(&self, username: &str) -> OwnerId {
        seed_owner(self.state.store.as_ref(), username, PASSWORD, None)
            .await
            .expect("seed owner")
    }

    /// Seed an owner and log in through the API. Returns the bearer token.
    pub async fn login_as(&self, username: &str) -> String {
        self.seed(username).await;
        let (status, body) = self
            .send_json(
                "POST",
                "/auth/login",
                None,
                Some(serde_json::json!({"username": username, "password": PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["accessToken"].as_str().expect("accessToken").to_string()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = self.app.clone().oneshot(request).await.expect("request");
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, body.to_vec())
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let (status, bytes) = self.send(request).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Create client → session → report for the token's owner. Returns
    /// `(client_id, session_id, report_id)`.
    pub async fn create_report(&self, token: &str) -> (String, String, String) {
        let (status, client) = self
            .send_json(
                "POST",
                "/clients",
                Some(token),
                Some(serde_json::json!({"name": "Lena Park", "email": "lena@example.com"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{client}");
        let client_id = client["id"].as_str().expect("client id").to_string();

        let (status, session) = self
            .send_json(
                "POST",
                "/sessions",
                Some(token),
                Some(serde_json::json!({
                    "clientId": client_id,
                    "sessionDate": "2026-05-04",
                    "durationMinutes": 55,
                    "focus": "Core"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{session}");
        let session_id = session["id"].as_str().expect("session id").to_string();

        let (status, report) = self
            .send_json(
                "POST",
                &format!("/sessions/{session_id}/report"),
                Some(token),
                Some(serde_json::json!({
                    "summary": "Strong hundred, steady breathing",
                    "strengths": "Breath control",
                    "improvements": "Neck tension",
                    "nextGoals": "Teaser prep",
                    "homework": "Pelvic curls x10"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{report}");
        let report_id = report["id"].as_str().expect("report id").to_string();

        (client_id, session_id, report_id)
    }
}
