//! Sensor Ingest Server
//!
//! HTTP service that accepts device readings and runs them through the shared
//! per-device detection engine. Bind to 127.0.0.1 by default (internal only).

use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;

mod date;
mod handlers;
mod state;
mod types;

pub use handlers::{device_status, health, ingest, reset_cooldown, reset_device};
pub use state::AppState;
pub use types::{IngestPayload, ResetResponse, Timestamp};

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/readings", post(ingest))
    .route("/devices/:id", get(device_status))
    .route("/devices/:id/reset", post(reset_device))
    .route("/devices/:id/cooldown/reset", post(reset_cooldown))
    .layer(CorsLayer::permissive())
    .with_state(state)
}
