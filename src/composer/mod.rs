//! Client-side half of the tester: builds ERPNext requests from the pieces a
//! user picks (credentials, method, doctype, record, field, body, params),
//! sends them through the proxy and turns the reply into something to show.
//! Also checks a connection and discovers the doctypes an instance offers.

use http::HeaderValue;
use std::fmt;
use url::Url;

mod discovery;
mod display;
mod request;

pub use discovery::{fetch_doctypes, test_connection, DiscoveryError, DOCTYPE_METHODS};
pub use display::{failure_message, DisplayOutcome};
pub use request::{ComposedRequest, LOGGED_USER_METHOD};

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Invalid base URL {0:?}")]
    InvalidBaseUrl(String),

    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Request could not be sent: {0}")]
    Transport(#[from] reqwest::Error),
}

/// ERPNext API key pair, sent as `Authorization: token <key>:<secret>`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}

impl ApiCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn authorization(&self) -> String {
        format!("token {}:{}", self.key, self.secret)
    }

    pub fn header_value(&self) -> Result<HeaderValue, ComposeError> {
        let mut value = HeaderValue::from_str(&self.authorization())
            .map_err(|_| ComposeError::InvalidHeader("API key or secret contains invalid characters".to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Cleans up a user-typed instance address: trims it, assumes `https://` when
/// no scheme is given and drops the trailing slash.
pub fn normalize_base_url(input: &str) -> Result<Url, ComposeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ComposeError::InvalidBaseUrl(input.to_string()));
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(with_scheme.trim_end_matches('/'))
        .map_err(|_| ComposeError::InvalidBaseUrl(input.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ComposeError::InvalidBaseUrl(input.to_string()));
    }

    Ok(url)
}

/// Origin string as it goes into `X-Target-URL`: no trailing slash.
pub fn target_header_value(base: &Url) -> String {
    base.as_str().trim_end_matches('/').to_string()
}
