pub mod metrics;
pub mod middleware;
pub mod plugins;

pub use self::{
    metrics::{MetricsExporter, MetricsRegistry},
    middleware::metrics_middleware,
    plugins::ConsolePlugin,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One record per call that passed through the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub request_id: Uuid,
    pub started_at: DateTime<Utc>,

    // Request metadata
    pub method: String,
    pub path: String,
    pub target: Option<String>,

    // Timing metrics
    pub total_latency: Duration,

    // Size metrics
    pub request_size: Option<u64>,
    pub response_size: Option<u64>,

    // Status metrics
    pub status_code: u16,

    // Error metrics
    pub error_type: Option<String>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            method: String::new(),
            path: String::new(),
            target: None,
            total_latency: Duration::default(),
            request_size: None,
            response_size: None,
            status_code: 0,
            error_type: None,
        }
    }
}
