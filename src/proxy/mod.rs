use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, HeaderValue, Method, Request},
    response::{IntoResponse, Response},
};
use serde::de::IgnoredAny;
use tracing::{debug, info};

use crate::{context::ForwardRequest, error::AppError};

mod client;
mod target;

pub use client::build_client;
pub use target::{
    build_upstream_url, forwarded_headers, parse_origin, resolve_target, RedactedHeaders,
    TARGET_HEADER,
};

/// Replays an inbound request against the upstream named by its target
/// header and relays the upstream status and body.
///
/// Non-2xx upstream statuses are not errors here; only transport-level
/// failures and malformed targets come back as `Err`.
pub async fn forward_request(
    client: &reqwest::Client,
    default_target: &str,
    request: Request<Body>,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();

    let target = resolve_target(&parts.headers, default_target)?;
    let url = build_upstream_url(&target, &parts.uri)?;
    info!(
        method = %parts.method,
        target = %target,
        url = %url,
        "Proxying request"
    );
    debug!(headers = ?RedactedHeaders(&parts.headers), "Inbound headers");

    let with_body = parts.method != Method::GET;
    let body = if with_body {
        Some(to_bytes(body, usize::MAX).await?)
    } else {
        None
    };
    let headers = forwarded_headers(&parts.headers, with_body);

    let forward = ForwardRequest::new(parts.method, url, target, headers, body);
    let upstream = forward.send(client).await?;

    relay_response(upstream).await
}

/// Turns the upstream response into the caller's response: same status, body
/// relayed as JSON.
pub async fn relay_response(upstream: reqwest::Response) -> Result<Response, AppError> {
    let status = upstream.status();
    let bytes = upstream.bytes().await?;
    info!(status = status.as_u16(), size = bytes.len(), "Upstream responded");

    if bytes.is_empty() {
        return Ok(status.into_response());
    }

    let json_content_type = [(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    )];
    Ok((status, json_content_type, json_body(bytes)).into_response())
}

/// JSON bodies pass through byte-for-byte; anything else (HTML error pages,
/// plain text) is wrapped as a JSON string.
fn json_body(bytes: Bytes) -> Bytes {
    if serde_json::from_slice::<IgnoredAny>(&bytes).is_ok() {
        return bytes;
    }

    debug!("Upstream body is not JSON, wrapping it as a string");
    let text = String::from_utf8_lossy(&bytes);
    match serde_json::to_vec(&text) {
        Ok(encoded) => Bytes::from(encoded),
        Err(_) => Bytes::from_static(b"null"),
    }
}
