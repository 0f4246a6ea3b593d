use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;
use url::{form_urlencoded, Url};

use super::{target_header_value, ApiCredentials, ComposeError, DisplayOutcome};
use crate::proxy::TARGET_HEADER;

/// Method called to check that a base URL and key pair are usable.
pub const LOGGED_USER_METHOD: &str = "frappe.auth.get_logged_user";

/// A request to an ERPNext instance, independent of where it is sent.
///
/// Path segments are stored unencoded and escaped when a URL is built, so
/// doctypes such as `Sales Order` need no special handling by callers.
#[derive(Debug, Clone)]
pub struct ComposedRequest {
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    credentials: Option<ApiCredentials>,
    body: Option<Value>,
}

impl ComposedRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            credentials: None,
            body: None,
        }
    }

    /// `GET /api/resource/<doctype>`
    pub fn list(doctype: &str) -> Self {
        Self::new(Method::GET, ["api", "resource", doctype])
    }

    /// `/api/resource/<doctype>/<name>` with the given method.
    pub fn record(method: Method, doctype: &str, name: &str) -> Self {
        Self::new(method, ["api", "resource", doctype, name])
    }

    /// `POST /api/resource/<doctype>`
    pub fn create(doctype: &str) -> Self {
        Self::new(Method::POST, ["api", "resource", doctype])
    }

    /// `/api/method/<dotted.path>`
    pub fn method_call(method: Method, dotted_path: &str) -> Self {
        Self::new(method, ["api", "method", dotted_path])
    }

    pub fn logged_user() -> Self {
        Self::method_call(Method::GET, LOGGED_USER_METHOD)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ComposeError> {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| ComposeError::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| ComposeError::InvalidHeader(format!("{}: {}", name, value)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Appends parameters from a raw query string such as `limit=10&fields=["name"]`.
    pub fn with_params(mut self, raw: &str) -> Self {
        let raw = raw.trim().trim_start_matches('?');
        self.query.extend(form_urlencoded::parse(raw.as_bytes()).into_owned());
        self
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_limit(self, limit: usize) -> Self {
        self.with_param("limit", &limit.to_string())
    }

    /// Sets the body from user-typed text after checking it is JSON.
    /// Blank text clears the body.
    pub fn with_json_body(mut self, text: &str) -> Result<Self, ComposeError> {
        let text = text.trim();
        self.body = if text.is_empty() {
            None
        } else {
            Some(serde_json::from_str(text)?)
        };
        Ok(self)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Body template for updating a single field: `{"<field>": ""}`.
    pub fn with_field_template(self, field: &str) -> Self {
        self.with_body(json!({ field: "" }))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The body that will actually be sent; GET never carries one.
    pub fn body(&self) -> Option<&Value> {
        if self.method == Method::GET {
            return None;
        }
        self.body.as_ref()
    }

    /// Resolves the request against `base`, keeping any path `base` already has.
    pub fn url(&self, base: &Url) -> Result<Url, ComposeError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ComposeError::InvalidBaseUrl(base.to_string()))?
            .pop_if_empty()
            .extend(&self.segments);

        url.set_query(None);
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }

    /// Headers sent with the request: user headers first, then JSON content
    /// negotiation and credentials, which always win.
    pub fn headers(&self) -> Result<HeaderMap, ComposeError> {
        let mut headers = self.headers.clone();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
            .entry(header::ACCEPT)
            .or_insert(HeaderValue::from_static("application/json"));
        if let Some(credentials) = &self.credentials {
            headers.insert(header::AUTHORIZATION, credentials.header_value()?);
        }
        Ok(headers)
    }

    /// The equivalent call made directly against `target`, as a cURL command.
    pub fn to_curl(&self, target: &Url) -> Result<String, ComposeError> {
        let url = self.url(target)?;
        let mut cmd = format!("curl -X {}", self.method);

        let mut lines: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| **name != header::AUTHORIZATION && **name != header::CONTENT_TYPE)
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?.trim();
                (!value.is_empty()).then(|| (name.to_string(), value.to_string()))
            })
            .collect();
        if let Some(credentials) = &self.credentials {
            lines.push(("Authorization".to_string(), credentials.authorization()));
        }
        lines.push(("Content-Type".to_string(), "application/json".to_string()));

        for (name, value) in lines {
            cmd.push_str(&format!(
                " \\\n  -H \"{}: {}\"",
                name,
                value.replace('"', "\\\"")
            ));
        }

        let sends_body = self.method == Method::POST || self.method == Method::PUT;
        if let Some(body) = self.body.as_ref().filter(|_| sends_body) {
            let is_empty_object = body.as_object().is_some_and(|o| o.is_empty());
            if !is_empty_object {
                let encoded = serde_json::to_string(body)?;
                cmd.push_str(&format!(" \\\n  -d \"{}\"", encoded.replace('"', "\\\"")));
            }
        }

        cmd.push_str(&format!(" \\\n  \"{}\"", url));
        Ok(cmd)
    }

    /// Sends the request through the proxy at `proxy_base`, asking it to
    /// forward to `target`.
    pub async fn send(
        &self,
        client: &reqwest::Client,
        proxy_base: &Url,
        target: &Url,
    ) -> Result<DisplayOutcome, ComposeError> {
        let (status, bytes) = self.send_raw(client, proxy_base, target).await?;
        Ok(DisplayOutcome::from_response(&self.method, status, &bytes))
    }

    /// Like [`send`](Self::send), but hands back the status and body untouched.
    pub async fn send_raw(
        &self,
        client: &reqwest::Client,
        proxy_base: &Url,
        target: &Url,
    ) -> Result<(StatusCode, Bytes), ComposeError> {
        let url = self.url(proxy_base)?;
        let mut headers = self.headers()?;
        let target_value = target_header_value(target);
        headers.insert(
            TARGET_HEADER,
            HeaderValue::from_str(&target_value)
                .map_err(|_| ComposeError::InvalidBaseUrl(target_value.clone()))?,
        );

        debug!(method = %self.method, url = %url, target = %target_value, "Sending composed request");

        let mut request = client.request(self.method.clone(), url).headers(headers);
        if let Some(body) = self.body() {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        Ok((status, bytes))
    }
}
