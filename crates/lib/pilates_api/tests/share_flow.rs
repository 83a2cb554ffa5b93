//! End-to-end share link flow through the router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::spawn_app;

#[tokio::test]
async fn login_report_mint_open() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;
    let (_, _, report_id) = t.create_report(&token).await;

    let (status, minted) = t
        .send_json(
            "POST",
            &format!("/reports/{report_id}/share"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{minted}");
    let share_token = minted["token"].as_str().unwrap().to_string();
    assert_eq!(share_token.len(), 64);
    assert_eq!(
        minted["shareUrl"],
        format!("http://studio.test/share/{share_token}")
    );

    let (status, shared) = t
        .send_json("GET", &format!("/share/{share_token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{shared}");
    assert_eq!(shared["clientName"], "Lena Park");
    assert_eq!(shared["sessionDate"], "2026-05-04");
    assert_eq!(shared["summary"], "Strong hundred, steady breathing");
    assert_eq!(shared["strengths"], "Breath control");
    assert_eq!(shared["improvements"], "Neck tension");
    assert_eq!(shared["nextGoals"], "Teaser prep");
    assert_eq!(shared["homework"], "Pelvic curls x10");
    assert_eq!(shared["viewCount"], 1);

    let (_, shared) = t
        .send_json("GET", &format!("/share/{share_token}"), None, None)
        .await;
    assert_eq!(shared["viewCount"], 2);

    let (status, listed) = t
        .send_json(
            "GET",
            &format!("/reports/{report_id}/shares"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let shares = listed["shares"].as_array().unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0]["viewCount"], 2);
    assert!(shares[0].get("token").is_none());
}

#[tokio::test]
async fn expire_hours_is_validated() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;
    let (_, _, report_id) = t.create_report(&token).await;
    let uri = format!("/reports/{report_id}/share");

    for hours in [0, 800] {
        let (status, body) = t
            .send_json(
                "POST",
                &uri,
                Some(&token),
                Some(serde_json::json!({"expireHours": hours})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{hours}h: {body}");
        assert_eq!(body["error"], "validation_error");
    }

    let before = chrono::Utc::now();
    let (status, minted) = t.send_json("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let expires_at: chrono::DateTime<chrono::Utc> =
        minted["expiresAt"].as_str().unwrap().parse().unwrap();
    let delta = expires_at - before;
    assert!(delta >= chrono::Duration::hours(72) - chrono::Duration::seconds(5));
    assert!(delta <= chrono::Duration::hours(72) + chrono::Duration::seconds(5));
}

#[tokio::test]
async fn revoked_link_is_gone() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;
    let (_, _, report_id) = t.create_report(&token).await;

    let (_, minted) = t
        .send_json(
            "POST",
            &format!("/reports/{report_id}/share"),
            Some(&token),
            Some(serde_json::json!({"expireHours": 24})),
        )
        .await;
    let share_token = minted["token"].as_str().unwrap().to_string();

    let (status, revoked) = t
        .send_json(
            "DELETE",
            &format!("/reports/{report_id}/share"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["revoked"], 1);

    let (status, body) = t
        .send_json("GET", &format!("/share/{share_token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "gone");
    assert!(body.get("summary").is_none());
}

#[tokio::test]
async fn unknown_share_token_is_not_found() {
    let t = spawn_app().await;
    let (status, _) = t
        .send_json("GET", &format!("/share/{}", "x".repeat(64)), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shared_photos_are_served_without_auth() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;
    let (_, _, report_id) = t.create_report(&token).await;

    let upload = Request::builder()
        .method("POST")
        .uri(format!("/reports/{report_id}/photos"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(&b"\x89PNG fake image"[..]))
        .unwrap();
    let (status, body) = t.send(upload).await;
    assert_eq!(status, StatusCode::CREATED);
    let photo: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let photo_id = photo["id"].as_str().unwrap().to_string();

    let (_, minted) = t
        .send_json(
            "POST",
            &format!("/reports/{report_id}/share"),
            Some(&token),
            None,
        )
        .await;
    let share_token = minted["token"].as_str().unwrap().to_string();

    let (_, shared) = t
        .send_json("GET", &format!("/share/{share_token}"), None, None)
        .await;
    assert_eq!(shared["photoIds"][0], photo_id.as_str());

    let fetch = Request::builder()
        .uri(format!("/share/{share_token}/photos/{photo_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = t.send(fetch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"\x89PNG fake image");

    // Asset fetches do not count as views.
    let (_, shared) = t
        .send_json("GET", &format!("/share/{share_token}"), None, None)
        .await;
    assert_eq!(shared["viewCount"], 2);
}

#[tokio::test]
async fn photo_upload_checks_content_type() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;
    let (_, _, report_id) = t.create_report(&token).await;

    let upload = Request::builder()
        .method("POST")
        .uri(format!("/reports/{report_id}/photos"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from("%PDF"))
        .unwrap();
    let (status, _) = t.send(upload).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn second_report_conflicts() {
    let t = spawn_app().await;
    let token = t.login_as("anna").await;
    let (_, session_id, report_id) = t.create_report(&token).await;

    let (status, body) = t
        .send_json(
            "POST",
            &format!("/sessions/{session_id}/report"),
            Some(&token),
            Some(serde_json::json!({"summary": "Overwrite attempt"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, report) = t
        .send_json(
            "GET",
            &format!("/sessions/{session_id}/report"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["id"], report_id.as_str());
    assert_eq!(report["summary"], "Strong hundred, steady breathing");
}
