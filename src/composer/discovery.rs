use http::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::{
    display::{parse_body, proxy_failure_details},
    normalize_base_url, target_header_value, ApiCredentials, ComposeError, ComposedRequest,
    LOGGED_USER_METHOD,
};

/// Whitelisted methods that list doctypes, tried in order.
pub const DOCTYPE_METHODS: [&str; 2] = [
    "frappe.desk.doctype.data_import_tool.data_import_tool.get_doctypes",
    "frappe.desk.doctype.data_import_tool.data_import_tool.get_doctypes_for_import",
];

const AUTH_FAILED: &str = "Authentication failed: Please check your API Key and Secret";

/// A failed connection check or doctype lookup, worded for the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DiscoveryError {
    /// Upstream status, when the instance answered at all.
    pub status: Option<StatusCode>,
    pub message: String,
}

impl DiscoveryError {
    fn new(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

enum CallFailure {
    /// The request never got an upstream answer. `kind` comes from the
    /// proxy's error payload and is absent when the proxy itself was down.
    Network { kind: Option<String>, details: String },
    Status { status: StatusCode, data: Value },
    Invalid(String),
}

async fn call(
    request: &ComposedRequest,
    client: &reqwest::Client,
    proxy_base: &Url,
    target: &Url,
) -> Result<Value, CallFailure> {
    let (status, bytes) = match request.send_raw(client, proxy_base, target).await {
        Ok(reply) => reply,
        Err(ComposeError::Transport(e)) => {
            return Err(CallFailure::Network {
                kind: None,
                details: e.to_string(),
            })
        }
        Err(e) => return Err(CallFailure::Invalid(e.to_string())),
    };

    let data = parse_body(&bytes);
    if status.is_success() {
        return Ok(data);
    }
    if let Some(details) = proxy_failure_details(status, &data) {
        let kind = data.get("kind").and_then(Value::as_str).map(str::to_string);
        return Err(CallFailure::Network { kind, details });
    }
    Err(CallFailure::Status { status, data })
}

fn resolve_base(base_url: &str) -> Result<Url, DiscoveryError> {
    if base_url.trim().is_empty() {
        return Err(DiscoveryError::new(None, "Base URL is required"));
    }
    normalize_base_url(base_url).map_err(|e| DiscoveryError::new(None, e.to_string()))
}

/// Checks that `base_url` is an ERPNext instance reachable through the proxy
/// and that `credentials` are accepted, by asking who is logged in.
///
/// Returns the instance's reply, typically `{"message": "<user>"}`.
pub async fn test_connection(
    client: &reqwest::Client,
    proxy_base: &Url,
    base_url: &str,
    credentials: &ApiCredentials,
) -> Result<Value, DiscoveryError> {
    let target = resolve_base(base_url)?;
    let base = target_header_value(&target);
    info!(target = %base, "Testing connection");

    let request = ComposedRequest::logged_user().with_credentials(credentials.clone());
    call(&request, client, proxy_base, &target)
        .await
        .map_err(|failure| connection_failure(&base, failure))
}

fn connection_failure(base: &str, failure: CallFailure) -> DiscoveryError {
    match failure {
        CallFailure::Invalid(message) => DiscoveryError::new(None, message),
        CallFailure::Network { kind, .. } if kind.as_deref() == Some("connect") => DiscoveryError::new(
            None,
            format!(
                "Connection refused: Cannot reach {}. Please check the server is running and the URL is correct",
                base
            ),
        ),
        CallFailure::Network { details, .. } => DiscoveryError::new(
            None,
            format!(
                "Network error: Cannot connect to {}. Please check your internet connection and base URL ({})",
                base, details
            ),
        ),
        CallFailure::Status { status, data } => {
            let message = match status.as_u16() {
                401 => AUTH_FAILED.to_string(),
                404 => format!(
                    "API endpoint not found: {}/api/method/{}. Please check your base URL",
                    base, LOGGED_USER_METHOD
                ),
                500..=599 => {
                    "Server error: ERPNext server is having issues. Please try again later".to_string()
                }
                _ => data
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Error: Request failed with status {}", status)),
            };
            DiscoveryError::new(Some(status), message)
        }
    }
}

/// Lists the doctypes of the instance at `base_url`.
///
/// The doctype methods are tried first; the first one whose reply holds a
/// non-empty list wins. Otherwise `/api/resource` is asked and the `doctype`
/// of each entry collected. When nothing yields doctypes, the last failed
/// method call is reported.
pub async fn fetch_doctypes(
    client: &reqwest::Client,
    proxy_base: &Url,
    base_url: &str,
    credentials: &ApiCredentials,
) -> Result<Vec<String>, DiscoveryError> {
    let target = resolve_base(base_url)?;
    let base = target_header_value(&target);
    let mut last_failure = None;

    for method in DOCTYPE_METHODS {
        let request =
            ComposedRequest::method_call(Method::GET, method).with_credentials(credentials.clone());
        match call(&request, client, proxy_base, &target).await {
            Ok(data) => {
                let doctypes = doctypes_from_method_reply(&data);
                if !doctypes.is_empty() {
                    info!(target = %base, method, count = doctypes.len(), "Fetched doctypes");
                    return Ok(doctypes);
                }
                debug!(method, "Reply held no doctypes");
            }
            Err(failure) => {
                debug!(method, "Doctype method failed");
                last_failure = Some(failure);
            }
        }
    }

    let request =
        ComposedRequest::new(Method::GET, ["api", "resource"]).with_credentials(credentials.clone());
    match call(&request, client, proxy_base, &target).await {
        Ok(data) => {
            let doctypes = doctypes_from_resource_list(&data);
            if !doctypes.is_empty() {
                info!(target = %base, count = doctypes.len(), "Fetched doctypes from resource list");
                return Ok(doctypes);
            }
        }
        Err(_) => debug!("Resource list failed too"),
    }

    Err(match last_failure {
        Some(failure) => doctype_failure(&base, failure),
        None => DiscoveryError::new(None, "Error: All doctype endpoints failed"),
    })
}

fn doctype_failure(base: &str, failure: CallFailure) -> DiscoveryError {
    match failure {
        CallFailure::Invalid(message) => DiscoveryError::new(None, message),
        CallFailure::Network { kind, .. } if kind.as_deref() == Some("connect") => {
            DiscoveryError::new(None, format!("Connection refused: Cannot reach {}", base))
        }
        CallFailure::Network { .. } => DiscoveryError::new(
            None,
            format!(
                "Network error: Cannot connect to {}. Please check your connection and base URL",
                base
            ),
        ),
        CallFailure::Status { status, data } => {
            let message = match status.as_u16() {
                401 => AUTH_FAILED.to_string(),
                403 => "Permission denied: You do not have access to fetch doctypes. Please check your user permissions."
                    .to_string(),
                404 => format!("API endpoint not found: {}/api/method/{}", base, DOCTYPE_METHODS[0]),
                500..=599 => "Server error: ERPNext server is having issues".to_string(),
                _ => match data.get("message").and_then(Value::as_str) {
                    Some(message) => format!("API Error: {}", message),
                    None => format!("Error: Request failed with status {}", status),
                },
            };
            DiscoveryError::new(Some(status), message)
        }
    }
}

/// Accepts `{"message": [...]}`, a bare array or `{"doctypes": [...]}`.
fn doctypes_from_method_reply(data: &Value) -> Vec<String> {
    let items = match data {
        Value::Array(items) => Some(items),
        _ => match data.get("message") {
            Some(message) => message.as_array(),
            None => data.get("doctypes").and_then(Value::as_array),
        },
    };

    unique_names(
        items
            .into_iter()
            .flatten()
            .filter_map(|item| match item {
                Value::String(name) => Some(name.as_str()),
                _ => item
                    .get("name")
                    .or_else(|| item.get("doctype"))
                    .and_then(Value::as_str),
            }),
    )
}

fn doctypes_from_resource_list(data: &Value) -> Vec<String> {
    unique_names(
        data.get("data")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| item.get("doctype").and_then(Value::as_str)),
    )
}

/// Drops blanks and repeats, keeping first-seen order.
fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names.filter(|name| !name.is_empty()) {
        if !unique.iter().any(|seen| seen == name) {
            unique.push(name.to_string());
        }
    }
    unique
}
