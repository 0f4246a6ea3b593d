use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{any, get},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::AppError,
    handlers,
    proxy::{build_client, TARGET_HEADER},
    telemetry::{metrics_middleware, MetricsRegistry},
};

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Requested-With, Accept, X-Target-URL";

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

/// Permissive CORS: any origin, the proxy's methods, and the request headers
/// the browser needs to send, the target header included.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            header::ACCEPT,
            TARGET_HEADER,
        ])
        .max_age(Duration::from_secs(3600))
}

pub fn app(state: Arc<AppState>, metrics_registry: Arc<MetricsRegistry>) -> Router {
    debug!("Creating application router");
    let router: Router<Arc<AppState>> = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/*path", any(handlers::proxy_request));

    let index = state.config.static_dir.join("index.html");
    let router = if index.is_file() {
        info!(dir = %state.config.static_dir.display(), "Serving frontend build");
        router.fallback_service(
            ServeDir::new(&state.config.static_dir).fallback(ServeFile::new(index)),
        )
    } else {
        debug!(
            dir = %state.config.static_dir.display(),
            "No frontend build found, using status page fallback"
        );
        router.fallback(handlers::status_page)
    };

    router
        .layer(from_fn_with_state(metrics_registry, metrics_middleware))
        .with_state(state)
        // Preflights are answered by the CORS layer itself; these fill in
        // the method and header lists on ordinary responses too.
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(cors_layer())
}
