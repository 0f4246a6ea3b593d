use crate::telemetry::{metrics::MetricsExporter, RequestMetrics};
use async_trait::async_trait;
use std::error::Error;

/// Prints every request record to stdout. Registered when `DEBUG_METRICS` is on.
#[derive(Debug, Default)]
pub struct ConsolePlugin;

impl ConsolePlugin {
    pub fn new() -> Self {
        ConsolePlugin
    }
}

#[async_trait]
impl MetricsExporter for ConsolePlugin {
    async fn export_metrics(&self, metrics: RequestMetrics) -> Result<(), Box<dyn Error + Send + Sync>> {
        println!(
            "{} {} {} -> {} in {:?} (target: {})",
            metrics.request_id,
            metrics.method,
            metrics.path,
            metrics.status_code,
            metrics.total_latency,
            metrics.target.as_deref().unwrap_or("-"),
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
