use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::{proxy::forward_request, server::AppState};

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "ERPNext API tester proxy is running",
    }))
}

pub async fn proxy_request(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Response {
    match forward_request(&state.client, &state.config.default_target, request).await {
        Ok(response) => response,
        Err(e) => {
            error!(kind = e.kind(), "Proxy error: {}", e);
            e.into_response()
        }
    }
}

/// Catch-all answer when no built frontend is available to serve.
pub async fn status_page() -> impl IntoResponse {
    Json(json!({
        "message": "Backend server is running",
        "status": "OK",
        "note": "Frontend build not found. Set STATIC_DIR to a directory containing index.html to serve the UI.",
    }))
}
