use std::time::Duration;

use crate::{config::AppConfig, error::AppError};

/// Shared upstream client. Pooled connections are reused across calls; the
/// configured timeout bounds the whole exchange including the body read.
pub fn build_client(config: &AppConfig) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(32)
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(config.upstream_timeout)
        .build()
        .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))
}
