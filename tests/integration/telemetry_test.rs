use super::common::{client, spawn_app_with_registry, spawn_upstream, test_config};
use async_trait::async_trait;
use erpnext_api_tester::telemetry::{MetricsExporter, MetricsRegistry, RequestMetrics};
use std::{
    error::Error,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default)]
struct CollectingExporter {
    records: Arc<Mutex<Vec<RequestMetrics>>>,
}

#[async_trait]
impl MetricsExporter for CollectingExporter {
    async fn export_metrics(&self, metrics: RequestMetrics) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.records.lock().unwrap().push(metrics);
        Ok(())
    }

    fn name(&self) -> &str {
        "collecting"
    }
}

async fn registry_with_collector() -> (Arc<MetricsRegistry>, CollectingExporter) {
    let registry = Arc::new(MetricsRegistry::new(true));
    let collector = CollectingExporter::default();
    registry.register_exporter(Box::new(collector.clone())).await;
    (registry, collector)
}

#[test_log::test(tokio::test)]
async fn test_forwarded_call_is_recorded() {
    let upstream = spawn_upstream("alpha").await;
    let (registry, collector) = registry_with_collector().await;
    let app = spawn_app_with_registry(test_config(), registry).await;
    assert_eq!(app.registry.exporter_count().await, 1);

    client()
        .post(app.url("/api/resource/Item"))
        .header("X-Target-URL", &upstream)
        .body(r#"{"item_code":"X"}"#)
        .send()
        .await
        .unwrap();

    let records = collector.records.lock().unwrap().clone();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.method, "POST");
    assert_eq!(record.path, "/api/resource/Item");
    assert_eq!(record.target.as_deref(), Some(upstream.as_str()));
    assert_eq!(record.status_code, 200);
    assert_eq!(record.request_size, Some(17));
    assert!(record.response_size.unwrap_or_default() > 0);
    assert!(record.error_type.is_none());
}

#[tokio::test]
async fn test_proxy_failure_kind_is_recorded() {
    let (registry, collector) = registry_with_collector().await;
    let app = spawn_app_with_registry(test_config(), registry).await;

    client()
        .get(app.url("/api/resource/Customer"))
        .header("X-Target-URL", "not-a-url")
        .send()
        .await
        .unwrap();

    let records = collector.records.lock().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 500);
    assert_eq!(records[0].error_type.as_deref(), Some("invalid_target"));
}
