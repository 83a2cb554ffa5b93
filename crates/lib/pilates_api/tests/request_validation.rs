//! Malformed bodies, paths and query strings get the same JSON error shape
//! as every other failure.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn client_without_name_is_a_validation_error() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;

    let (status, body) = t
        .send_json("POST", "/clients", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn unparseable_fields_are_validation_errors() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;

    let (status, body) = t
        .send_json(
            "POST",
            "/sessions",
            Some(&token),
            Some(json!({"clientId": "00000000-0000-0000-0000-000000000000", "sessionDate": "not-a-date"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    let (status, body) = t
        .send_json("POST", "/auth/login", None, Some(json!({"username": "anna"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn broken_json_is_a_validation_error() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;

    let request = Request::builder()
        .method("POST")
        .uri("/clients")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, bytes) = t.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn json_body_needs_json_content_type() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;

    let request = Request::builder()
        .method("POST")
        .uri("/clients")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"name": "Lena"}"#))
        .unwrap();
    let (status, bytes) = t.send(request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "unsupported_media_type");
}

#[tokio::test]
async fn bad_ids_in_path_and_query_are_validation_errors() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;

    for uri in [
        "/clients/not-a-uuid",
        "/reports/42",
        "/reports/00000000-0000-0000-0000-000000000000/photos/nope",
        "/sessions?clientId=not-a-uuid",
    ] {
        let (status, body) = t.send_json("GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "validation_error", "{uri}");
    }
}

#[tokio::test]
async fn reminder_on_report_without_homework_is_rejected() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;

    let (_, client) = t
        .send_json("POST", "/clients", Some(&token), Some(json!({"name": "Mia"})))
        .await;
    let (_, session) = t
        .send_json(
            "POST",
            "/sessions",
            Some(&token),
            Some(json!({"clientId": client["id"], "sessionDate": "2026-05-04"})),
        )
        .await;
    let session_id = session["id"].as_str().unwrap();
    let (status, report) = t
        .send_json(
            "POST",
            &format!("/sessions/{session_id}/report"),
            Some(&token),
            Some(json!({"summary": "Good roll-ups"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{report}");
    let report_uri = format!("/reports/{}", report["id"].as_str().unwrap());

    let (status, body) = t
        .send_json(
            "PATCH",
            &report_uri,
            Some(&token),
            Some(json!({"homeworkRemindAt": "2026-05-06T08:00:00Z"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    let (status, body) = t
        .send_json(
            "PATCH",
            &report_uri,
            Some(&token),
            Some(json!({"homework": "Roll-downs x8", "homeworkRemindAt": "2026-05-06T08:00:00Z"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["homework"], "Roll-downs x8");
}
