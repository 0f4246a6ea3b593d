use super::common::{client, spawn_app, test_config};
use reqwest::StatusCode;
use serde_json::Value;
use std::fs;

#[tokio::test]
async fn test_health_returns_static_ok_payload() {
    let app = spawn_app(test_config()).await;

    let response = client().get(app.url("/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert!(body["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn test_fallback_without_frontend_build_returns_status_json() {
    let app = spawn_app(test_config()).await;

    for path in ["/", "/request-builder", "/static/js/main.js"] {
        let response = client().get(app.url(path)).send().await.unwrap();

        assert_eq!(response.status(), StatusCode::OK, "path {}", path);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "OK");
        assert_eq!(body["message"], "Backend server is running");
        assert!(body["note"].is_string());
    }
}

#[tokio::test]
async fn test_fallback_serves_frontend_build_when_present() {
    let build = tempfile::tempdir().unwrap();
    fs::write(build.path().join("index.html"), "<html>tester</html>").unwrap();
    fs::write(build.path().join("app.js"), "console.log('tester');").unwrap();

    let mut config = test_config();
    config.static_dir = build.path().to_path_buf();
    let app = spawn_app(config).await;

    let asset = client().get(app.url("/app.js")).send().await.unwrap();
    assert_eq!(asset.status(), StatusCode::OK);
    assert_eq!(asset.text().await.unwrap(), "console.log('tester');");

    // Client-side routes fall back to index.html
    let page = client().get(app.url("/dashboard")).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(page.text().await.unwrap(), "<html>tester</html>");

    let health = client().get(app.url("/health")).send().await.unwrap();
    let body: Value = health.json().await.unwrap();
    assert_eq!(body["status"], "OK");
}
