use dotenv::dotenv;
use std::{env, path::PathBuf, time::Duration};

use crate::error::AppError;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TARGET_URL: &str = "https://demo.erpnext.com";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub host: String,
    /// Origin used when a request carries no `X-Target-URL` header.
    pub default_target: String,
    pub upstream_timeout: Duration,
    /// Directory holding the built frontend, served as the catch-all route.
    pub static_dir: PathBuf,
}

impl AppConfig {
    pub fn new() -> Result<Self, AppError> {
        dotenv().ok();

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("PORT must be a number, got {:?}", raw)))?,
            Err(_) => DEFAULT_PORT,
        };

        let upstream_timeout = match env::var("UPSTREAM_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                AppError::Config(format!(
                    "UPSTREAM_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                    raw
                ))
            })?,
            Err(_) => Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        };

        Ok(Self {
            port,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            default_target: env::var("DEFAULT_TARGET_URL")
                .unwrap_or_else(|_| DEFAULT_TARGET_URL.to_string()),
            upstream_timeout,
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("build")),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
            default_target: DEFAULT_TARGET_URL.to_string(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            static_dir: PathBuf::from("build"),
        }
    }
}

/// Output format of the log layer, chosen with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// `json` selects JSON lines; anything else keeps the compact format.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub debug_mode: bool,
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    pub fn new() -> Self {
        dotenv().ok();

        Self {
            debug_mode: env::var("DEBUG_METRICS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            log_format: env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        }
    }
}
