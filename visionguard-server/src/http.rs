// HTTP surface: readiness routes plus the stream endpoint

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use crate::websocket::stream_handler;

pub const STATUS_MESSAGE: &str = "VisionGuard backend API is running";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/ws/stream", get(stream_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: STATUS_MESSAGE.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
