use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use erpnext_api_tester::{
    app,
    telemetry::{ConsolePlugin, MetricsRegistry},
    config::LogFormat,
    AppConfig, AppState, TelemetryConfig,
};

#[tokio::main]
async fn main() {
    let telemetry_config = TelemetryConfig::new();

    // Initialize tracing
    let json_logs = telemetry_config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().compact()))
        .init();

    // Load configuration
    info!("Loading application configuration");
    let config = match AppConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    debug!(
        "Configuration loaded: port={}, host={}, default_target={}, upstream_timeout={:?}",
        config.port, config.host, config.default_target, config.upstream_timeout
    );

    debug!(
        "Telemetry configuration: debug_mode={}, log_format={:?}",
        telemetry_config.debug_mode, telemetry_config.log_format
    );
    let metrics_registry = Arc::new(MetricsRegistry::new(telemetry_config.debug_mode));
    if telemetry_config.debug_mode {
        debug!("Registering Console plugin for metrics");
        metrics_registry
            .register_exporter(Box::new(ConsolePlugin::new()))
            .await;
    }

    let listener = match tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let default_target = state.config.default_target.clone();
    let router = app(state, metrics_registry);

    match listener.local_addr() {
        Ok(addr) => info!("ERPNext API tester proxy listening on http://{}", addr),
        Err(e) => debug!("Could not read local address: {}", e),
    }
    info!(
        "Forwarding /api calls to the X-Target-URL header, default {}",
        default_target
    );

    debug!("Starting server with graceful shutdown");
    axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap_or_else(|e| {
        error!("Server error: {}", e);
        std::process::exit(1);
    });
}

async fn shutdown_signal() {
    info!("Registering shutdown signal handler");
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            debug!("CTRL+C signal received");
        },
        _ = terminate => {
            debug!("Terminate signal received");
        },
    }
    info!("Shutdown signal received, starting graceful shutdown");
}
