use super::common::{
    client, spawn_app, spawn_upstream, test_config, unreachable_origin, SLOW_ROUTE_DELAY,
};
use erpnext_api_tester::proxy::{build_upstream_url, forwarded_headers, resolve_target};
use http::{header, HeaderMap, HeaderValue, Uri};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};

#[test_log::test(tokio::test)]
async fn test_get_is_forwarded_to_target_with_path_and_query() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    let response = client()
        .get(app.url("/api/resource/Customer?limit=10"))
        .header("X-Target-URL", &upstream)
        .header("Authorization", "token key123:secret456")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["upstream"], "alpha");
    assert_eq!(body["method"], "GET");
    assert_eq!(body["path"], "/api/resource/Customer");
    assert_eq!(body["query"], "limit=10");
    assert_eq!(body["headers"]["authorization"], "token key123:secret456");
}

#[tokio::test]
async fn test_target_and_host_headers_are_not_forwarded() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    let response = client()
        .get(app.url("/api/resource/Item"))
        .header("X-Target-URL", &upstream)
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    let headers = body["headers"].as_object().unwrap();
    assert!(!headers.contains_key("x-target-url"));

    // The outbound client sets its own Host for the upstream; the proxy's
    // address must not leak through.
    let upstream_authority = upstream.trim_start_matches("http://");
    assert_eq!(headers["host"], upstream_authority);
    assert_ne!(headers["host"], app.addr.to_string());
}

#[tokio::test]
async fn test_other_headers_are_forwarded_unmodified() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    let response = client()
        .get(app.url("/api/resource/Item"))
        .header("X-Target-URL", &upstream)
        .header("Accept", "application/json")
        .header("X-Requested-With", "XMLHttpRequest")
        .header("X-Frappe-CSRF-Token", "abc123")
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["headers"]["accept"], "application/json");
    assert_eq!(body["headers"]["x-requested-with"], "XMLHttpRequest");
    assert_eq!(body["headers"]["x-frappe-csrf-token"], "abc123");
}

#[test_log::test(tokio::test)]
async fn test_bodies_pass_through_unmodified_for_non_get_methods() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;
    let payload = r#"{"item_code":"X",  "qty": 1.50}"#;

    for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
        let response = client()
            .request(method.clone(), app.url("/api/resource/Item/X"))
            .header("X-Target-URL", &upstream)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "method {}", method);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["method"], method.as_str());
        assert_eq!(body["body"], payload, "method {}", method);
        assert_eq!(body["headers"]["content-type"], "application/json");
    }
}

#[tokio::test]
async fn test_get_body_is_not_forwarded() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    let response = client()
        .get(app.url("/api/resource/Item"))
        .header("X-Target-URL", &upstream)
        .body("should not arrive")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["body"], "");
    assert!(body["headers"].get("content-length").is_none());
}

#[tokio::test]
async fn test_upstream_error_statuses_are_relayed_verbatim() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    for code in [400u16, 401, 403, 404, 417, 500, 503] {
        let response = client()
            .get(app.url(&format!("/api/status/{}", code)))
            .header("X-Target-URL", &upstream)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), code);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], code);
        assert!(body.get("error").is_none(), "status {} was treated as a proxy error", code);
    }
}

#[tokio::test]
async fn test_non_json_upstream_body_is_wrapped_as_json_string() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    let response = client()
        .get(app.url("/api/html"))
        .header("X-Target-URL", &upstream)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, Value::String("<html><body>Bad Gateway</body></html>".to_string()));
}

#[tokio::test]
async fn test_empty_upstream_body_stays_empty() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    let response = client()
        .delete(app.url("/api/empty"))
        .header("X-Target-URL", &upstream)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_target_header_uses_default_origin() {
    let upstream = spawn_upstream("default").await;
    let mut config = test_config();
    config.default_target = upstream.clone();
    let app = spawn_app(config).await;

    let response = client()
        .get(app.url("/api/resource/Customer"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["upstream"], "default");
}

#[tokio::test]
async fn test_trailing_slash_on_target_is_ignored() {
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;

    let response = client()
        .get(app.url("/api/resource/Customer"))
        .header("X-Target-URL", format!("{}/", upstream))
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["path"], "/api/resource/Customer");
}

#[test_log::test(tokio::test)]
async fn test_invalid_target_returns_500_with_error() {
    let app = spawn_app(test_config()).await;

    let response = client()
        .post(app.url("/api/resource/Item"))
        .header("X-Target-URL", "not-a-url")
        .header("Content-Type", "application/json")
        .body(r#"{"item_code":"X"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Proxy error occurred");
    assert_eq!(body["kind"], "invalid_target");
    assert!(body["details"].as_str().unwrap().contains("not-a-url"));
}

#[tokio::test]
async fn test_unsupported_target_scheme_is_rejected() {
    let app = spawn_app(test_config()).await;

    let response = client()
        .get(app.url("/api/resource/Item"))
        .header("X-Target-URL", "ftp://erp.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_target");
}

#[test_log::test(tokio::test)]
async fn test_unreachable_target_returns_500_for_every_method() {
    let origin = unreachable_origin().await;
    let app = spawn_app(test_config()).await;

    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
        let response = client()
            .request(method.clone(), app.url("/api/resource/Customer"))
            .header("X-Target-URL", &origin)
            .body("{}")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "method {}", method);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Proxy error occurred");
        assert_eq!(body["kind"], "connect");
    }
}

#[tokio::test]
async fn test_slow_upstream_times_out_within_bound() {
    let upstream = spawn_upstream("slow").await;
    let mut config = test_config();
    config.upstream_timeout = Duration::from_millis(300);
    let app = spawn_app(config).await;

    let started = Instant::now();
    let response = client()
        .get(app.url("/api/slow"))
        .header("X-Target-URL", &upstream)
        .send()
        .await
        .unwrap();

    assert!(started.elapsed() < SLOW_ROUTE_DELAY);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "timeout");
}

#[tokio::test]
async fn test_proxy_survives_repeated_failures() {
    let origin = unreachable_origin().await;
    let upstream = spawn_upstream("alpha").await;
    let app = spawn_app(test_config()).await;
    let client = client();

    for _ in 0..25 {
        let response = client
            .get(app.url("/api/resource/Customer"))
            .header("X-Target-URL", &origin)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = client
            .get(app.url("/api/resource/Customer"))
            .header("X-Target-URL", "::garbage::")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let response = client
        .get(app.url("/api/resource/Customer"))
        .header("X-Target-URL", &upstream)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_calls_to_different_targets_do_not_interfere() {
    let alpha = spawn_upstream("alpha").await;
    let beta = spawn_upstream("beta").await;
    let app = spawn_app(test_config()).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let (name, origin) = if i % 2 == 0 {
            ("alpha", alpha.clone())
        } else {
            ("beta", beta.clone())
        };
        let url = app.url(&format!("/api/resource/Customer/CUST-{}", i));
        handles.push(tokio::spawn(async move {
            let body: Value = client()
                .get(url)
                .header("X-Target-URL", origin)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            (name, i, body)
        }));
    }

    for handle in handles {
        let (name, i, body) = handle.await.unwrap();
        assert_eq!(body["upstream"], name);
        assert_eq!(body["path"], format!("/api/resource/Customer/CUST-{}", i));
    }
}

#[test]
fn test_resolve_target_falls_back_for_blank_header() {
    let mut headers = HeaderMap::new();
    assert_eq!(
        resolve_target(&headers, "https://demo.erpnext.com").unwrap(),
        "https://demo.erpnext.com"
    );

    headers.insert("x-target-url", HeaderValue::from_static("   "));
    assert_eq!(
        resolve_target(&headers, "https://demo.erpnext.com/").unwrap(),
        "https://demo.erpnext.com"
    );

    headers.insert("x-target-url", HeaderValue::from_static(" http://erp.local:8000/ "));
    assert_eq!(
        resolve_target(&headers, "https://demo.erpnext.com").unwrap(),
        "http://erp.local:8000"
    );
}

#[test]
fn test_upstream_url_keeps_api_prefix_and_query() {
    let uri: Uri = "/api/resource/Sales%20Order?fields=%5B%22name%22%5D&limit=5"
        .parse()
        .unwrap();
    let url = build_upstream_url("https://erp.example.com", &uri).unwrap();
    assert_eq!(
        url.as_str(),
        "https://erp.example.com/api/resource/Sales%20Order?fields=%5B%22name%22%5D&limit=5"
    );
}

#[test]
fn test_forwarded_headers_keep_repeated_values() {
    let mut inbound = HeaderMap::new();
    inbound.insert(header::HOST, HeaderValue::from_static("localhost:3001"));
    inbound.insert("x-target-url", HeaderValue::from_static("https://erp.example.com"));
    inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("17"));
    inbound.append(header::COOKIE, HeaderValue::from_static("sid=1"));
    inbound.append(header::COOKIE, HeaderValue::from_static("theme=dark"));

    let with_body = forwarded_headers(&inbound, true);
    assert!(with_body.get(header::HOST).is_none());
    assert!(with_body.get("x-target-url").is_none());
    assert_eq!(with_body.get(header::CONTENT_LENGTH).unwrap(), "17");
    assert_eq!(with_body.get_all(header::COOKIE).iter().count(), 2);

    let without_body = forwarded_headers(&inbound, false);
    assert!(without_body.get(header::CONTENT_LENGTH).is_none());
    assert_eq!(without_body.get_all(header::COOKIE).iter().count(), 2);
}
