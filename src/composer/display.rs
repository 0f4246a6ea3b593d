use http::{Method, StatusCode};
use serde_json::Value;

/// What the tester shows after a call.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOutcome {
    Success {
        status: StatusCode,
        data: Value,
    },
    Failure {
        status: Option<StatusCode>,
        message: String,
        data: Option<Value>,
    },
}

impl DisplayOutcome {
    /// Classifies a proxy reply. Proxy-side failures (the proxy's own 500
    /// payload) are told apart from upstream errors by their `error` field.
    pub fn from_response(method: &Method, status: StatusCode, body: &[u8]) -> Self {
        let data = parse_body(body);

        if status.is_success() {
            return DisplayOutcome::Success { status, data };
        }

        if let Some(details) = proxy_failure_details(status, &data) {
            return DisplayOutcome::Failure {
                status: None,
                message: format!(
                    "Network error: Please check your internet connection and base URL ({})",
                    details
                ),
                data: Some(data),
            };
        }

        DisplayOutcome::Failure {
            status: Some(status),
            message: failure_message(method, status, &data),
            data: Some(data),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DisplayOutcome::Success { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DisplayOutcome::Success { status, .. } => Some(*status),
            DisplayOutcome::Failure { status, .. } => *status,
        }
    }

    /// Pretty-printed JSON for the response pane, or the failure message.
    pub fn render(&self) -> String {
        match self {
            DisplayOutcome::Success { data, .. } => {
                serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
            }
            DisplayOutcome::Failure { message, .. } => message.clone(),
        }
    }
}

pub(super) fn parse_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

pub(super) fn proxy_failure_details(status: StatusCode, data: &Value) -> Option<String> {
    if status != StatusCode::INTERNAL_SERVER_ERROR {
        return None;
    }
    if data.get("error").and_then(Value::as_str) != Some("Proxy error occurred") {
        return None;
    }
    Some(
        data.get("details")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    )
}

/// Human-readable explanation of an ERPNext error status, worded for the
/// operation the method implies.
pub fn failure_message(method: &Method, status: StatusCode, data: &Value) -> String {
    match status.as_u16() {
        401 => "Authentication failed: Please check your API Key and Secret".to_string(),
        403 => {
            let action = match method.as_str() {
                "GET" => "read this Doctype",
                "POST" => "create records in this Doctype",
                "PUT" => "update records in this Doctype",
                "DELETE" => "delete records in this Doctype",
                _ => "perform this operation on this Doctype",
            };
            format!(
                "Permission denied: You don't have permission to {}. Please check your user permissions in ERPNext.",
                action
            )
        }
        404 if *method == Method::GET => {
            "Doctype not found: Please check that the doctype name is correct and exists in your ERPNext instance."
                .to_string()
        }
        404 => "API endpoint not found: Please check your base URL and doctype".to_string(),
        400 if *method == Method::POST || *method == Method::PUT => {
            "Bad request: Please check your request data format and required fields. Make sure all required fields are provided."
                .to_string()
        }
        400 => "Bad request: Please check your request data and parameters".to_string(),
        405 => format!(
            "Method not allowed: {} method is not supported for this endpoint. Please check the API documentation.",
            method
        ),
        422 => "Validation error: The request data is invalid. Please check your input data and try again."
            .to_string(),
        500..=599 => "Server error: ERPNext server is having issues. Please try again later.".to_string(),
        _ => upstream_message(data)
            .unwrap_or_else(|| format!("Request failed with status {}", status)),
    }
}

fn upstream_message(data: &Value) -> Option<String> {
    ["message", "exception", "exc_type"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
