//! Edit session, export and service route integration tests.
//!
//! Run with: `cargo test -p cutroom-api --test sessions_test`

mod helpers;

use helpers::{video_bytes, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn test_delete_session_removes_proxies_and_uploads() {
    let app = TestApp::spawn().await;
    let body: Value = app.upload("clip.mp4", video_bytes(1, 1024), Some("gone")).await.json();
    let proxy_url = body["proxy"]["web_reference"].as_str().unwrap().to_string();
    let other: Value = app.upload("clip.mp4", video_bytes(2, 1024), Some("stays")).await.json();

    let response = app.server.delete("/api/sessions/gone").await;
    assert_eq!(response.status_code(), 200);
    let deleted: Value = response.json();
    assert_eq!(deleted["removed_proxies"], 1);
    assert_eq!(deleted["removed_uploads"], true);

    assert!(!app.upload_root().join("gone").exists());
    assert_eq!(app.server.get(&proxy_url).await.status_code(), 404);

    let stats: Value = app.server.get("/api/cache/stats").await.json();
    assert_eq!(stats["entry_count"], 1);
    let other_url = other["proxy"]["web_reference"].as_str().unwrap();
    assert_eq!(app.server.get(other_url).await.status_code(), 200);

    // No dangling metadata after a reload either.
    let app = app.restart().await;
    let stats: Value = app.server.get("/api/cache/stats").await.json();
    assert_eq!(stats["entry_count"], 1);
}

#[tokio::test]
async fn test_delete_unknown_session_is_ok() {
    let app = TestApp::spawn().await;

    let response = app.server.delete("/api/sessions/never-existed").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["removed_proxies"], 0);
    assert_eq!(body["removed_uploads"], false);
}

#[tokio::test]
async fn test_save_edits_and_export() {
    let app = TestApp::spawn().await;
    let original = video_bytes(3, 2048);
    app.upload("clip.mov", original.clone(), Some("editing")).await;

    let response = app
        .server
        .post("/api/save-edits")
        .json(&json!({
            "session_id": "editing",
            "edits": [{"type": "cut", "start": 1.0, "end": 2.5}, {"type": "fade"}]
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let saved: Value = response.json();
    assert_eq!(saved["edit_count"], 2);

    let record: Value = serde_json::from_slice(
        &std::fs::read(app.upload_root().join("editing").join("session.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record["edit_instructions"].as_array().unwrap().len(), 2);
    assert!(record["last_edit"].is_string());

    let response = app
        .server
        .post("/api/export")
        .json(&json!({ "session_id": "editing" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let export: Value = response.json();
    let export_url = export["export_url"].as_str().unwrap();
    assert!(export_url.starts_with("/static/uploads/editing/export_editing_"));

    let downloaded = app.server.get(export_url).await;
    assert_eq!(downloaded.status_code(), 200);
    assert_eq!(downloaded.as_bytes().as_ref(), original.as_slice());
    assert_eq!(downloaded.header("content-type").to_str().unwrap(), "video/mp4");
}

#[tokio::test]
async fn test_upload_root_serves_only_exports() {
    let app = TestApp::spawn().await;
    app.upload("clip.mov", video_bytes(4, 1024), Some("private")).await;
    assert!(app.config.proxy_dir().join("cache_index.json").exists());
    assert!(app.upload_root().join("private").join("session.json").exists());

    for url in [
        "/static/uploads/proxies/cache_index.json",
        "/static/uploads/private/session.json",
        "/static/uploads/private/clip.mov",
        "/static/uploads/.incoming/anything",
        "/static/uploads/private/export_private_1.mp4",
    ] {
        let response = app.server.get(url).await;
        assert_eq!(response.status_code(), 404, "{url} should not be served");
    }
}

#[tokio::test]
async fn test_save_edits_requires_session() {
    let app = TestApp::spawn().await;

    let missing = app
        .server
        .post("/api/save-edits")
        .json(&json!({ "edits": [] }))
        .await;
    assert_eq!(missing.status_code(), 400);

    let unknown = app
        .server
        .post("/api/save-edits")
        .json(&json!({ "session_id": "nobody", "edits": [] }))
        .await;
    assert_eq!(unknown.status_code(), 404);
}

#[tokio::test]
async fn test_export_unknown_session_is_not_found() {
    let app = TestApp::spawn().await;
    let response = app
        .server
        .post("/api/export")
        .json(&json!({ "session_id": "nobody" }))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_malformed_json_body_uses_error_shape() {
    let app = TestApp::spawn().await;
    let response = app
        .server
        .post("/api/export")
        .json(&json!({ "session_id": 42 }))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_health_reports_tools() {
    let app = TestApp::spawn().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ffmpeg"], true);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::spawn().await;
    let response = app
        .server
        .get("/api/cache/stats")
        .add_header("X-Request-ID", "trace-123")
        .await;
    assert_eq!(response.header("X-Request-ID").to_str().unwrap(), "trace-123");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = TestApp::spawn().await;
    let response = app.server.get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["paths"]["/api/upload"].is_object());
}
