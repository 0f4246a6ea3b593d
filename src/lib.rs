//! Forwarding proxy and request composer for exercising the ERPNext REST API
//! from a browser.
//!
//! The proxy accepts any request under `/api`, forwards it to the origin named
//! in the `X-Target-URL` header and relays the upstream status and body back
//! with permissive CORS headers.

pub mod composer;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod server;
pub mod telemetry;

pub use config::{AppConfig, TelemetryConfig};
pub use error::AppError;
pub use server::{app, AppState};
