//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - Control surface (security mode, alert recipient)
//! - Read surfaces (alert history, camera status, latest frames)

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let offline = state.status.get_offline_cameras().await;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cameras_configured: state.config.cameras.len(),
        cameras_offline: offline.len(),
        security_mode: state.security_mode.get().await,
    };

    Json(response)
}
