use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Request to upstream failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("Failed to read request body: {0}")]
    BodyRead(#[from] axum::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Short, stable name of the failure class, surfaced as `kind` in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Upstream(e) if e.is_timeout() => "timeout",
            AppError::Upstream(e) if e.is_connect() => "connect",
            AppError::Upstream(_) => "upstream",
            AppError::InvalidTarget(_) => "invalid_target",
            AppError::BodyRead(_) => "body_read",
            AppError::Config(_) => "config",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Callers of the proxy only ever see one failure status; the kind
        // field carries the distinction.
        let details = match &self {
            AppError::Upstream(e) if e.is_timeout() => {
                format!("Upstream request timed out: {}", e)
            }
            AppError::Upstream(e) if e.is_connect() => {
                format!("Could not connect to upstream: {}", e)
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": "Proxy error occurred",
            "details": details,
            "kind": self.kind(),
        }));

        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
        response.extensions_mut().insert(ProxyFailure(self.kind()));
        response
    }
}

/// Response extension marking a response synthesized from a proxy failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyFailure(pub &'static str);
