use super::metrics::MetricsRegistry;
use super::RequestMetrics;
use crate::{error::ProxyFailure, proxy::TARGET_HEADER};
use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{header, Request, Response},
    middleware::Next,
};
use std::{sync::Arc, time::Instant};
use tracing::{debug, warn};

/// Records one [`RequestMetrics`] per call without touching the bodies.
pub async fn metrics_middleware(
    State(registry): State<Arc<MetricsRegistry>>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let start = Instant::now();
    let mut metrics = RequestMetrics::default();

    metrics.method = req.method().to_string();
    metrics.path = req.uri().path().to_string();
    metrics.target = req
        .headers()
        .get(&TARGET_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    metrics.request_size = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse().ok());

    debug!(
        request_id = %metrics.request_id,
        method = %metrics.method,
        path = %metrics.path,
        "Received request"
    );

    let response = next.run(req).await;

    metrics.total_latency = start.elapsed();
    metrics.status_code = response.status().as_u16();
    metrics.response_size = response.body().size_hint().exact();
    metrics.error_type = response
        .extensions()
        .get::<ProxyFailure>()
        .map(|failure| failure.0.to_string());

    if let Some(kind) = &metrics.error_type {
        warn!(
            request_id = %metrics.request_id,
            kind = %kind,
            latency_ms = metrics.total_latency.as_millis() as u64,
            "Request failed at the proxy"
        );
    }

    registry.record_metrics(metrics).await;

    response
}
