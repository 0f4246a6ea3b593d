use bytes::Bytes;
use http::{HeaderMap, Method};
use reqwest::Url;

use crate::error::AppError;

/// A fully resolved outbound call: everything the proxy sends upstream for
/// one inbound request.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: Url,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    pub fn new(
        method: Method,
        url: Url,
        target: String,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        Self {
            method,
            url,
            target,
            headers,
            body,
        }
    }

    pub async fn send(self, client: &reqwest::Client) -> Result<reqwest::Response, AppError> {
        let mut request = client.request(self.method, self.url).headers(self.headers);
        if let Some(body) = self.body {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }
}
