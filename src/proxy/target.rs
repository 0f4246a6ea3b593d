use axum::http::{header, HeaderMap, HeaderName, Uri};
use reqwest::Url;
use std::fmt;

use crate::error::AppError;

/// Request header naming the upstream origin for a forwarded call.
pub const TARGET_HEADER: HeaderName = HeaderName::from_static("x-target-url");

/// Picks the upstream origin for a call, falling back to `default_target`
/// when the target header is missing or blank.
///
/// The returned origin has no trailing slash so it can be joined with the
/// inbound path directly.
pub fn resolve_target(headers: &HeaderMap, default_target: &str) -> Result<String, AppError> {
    let supplied = match headers.get(&TARGET_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| {
            AppError::InvalidTarget("X-Target-URL header is not valid UTF-8".to_string())
        })?),
        None => None,
    };

    let raw = supplied
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default_target);

    parse_origin(raw)
}

/// Validates an origin string as an absolute http(s) URL with a host.
pub fn parse_origin(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim().trim_end_matches('/');

    let url = Url::parse(trimmed)
        .map_err(|e| AppError::InvalidTarget(format!("{:?} is not an absolute URL: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidTarget(format!(
            "unsupported scheme {:?} in {:?}",
            url.scheme(),
            raw
        )));
    }
    if url.host_str().is_none() {
        return Err(AppError::InvalidTarget(format!("{:?} has no host", raw)));
    }

    Ok(trimmed.to_string())
}

/// Joins the origin with the inbound path and query. The `/api` prefix is
/// part of the path and is kept, since ERPNext serves its REST API there.
pub fn build_upstream_url(target: &str, uri: &Uri) -> Result<Url, AppError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let full = format!("{}{}", target, path_and_query);
    Url::parse(&full).map_err(|e| AppError::InvalidTarget(format!("{:?}: {}", full, e)))
}

/// Copies the inbound headers minus `Host` and the target header.
///
/// When the body is not forwarded its `Content-Length` goes with it, so the
/// upstream never waits on bytes that will not arrive.
pub fn forwarded_headers(inbound: &HeaderMap, with_body: bool) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if name == header::HOST || name == TARGET_HEADER {
            continue;
        }
        if !with_body && name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Debug view of a header map that masks credentials.
pub struct RedactedHeaders<'a>(pub &'a HeaderMap);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, value)| {
                let shown = if name == header::AUTHORIZATION || name == header::COOKIE {
                    "<redacted>"
                } else {
                    value.to_str().unwrap_or("<binary>")
                };
                (name.as_str(), shown)
            }))
            .finish()
    }
}
