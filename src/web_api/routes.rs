//! API Routes

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::error::{Error, Result};
use crate::models::{CameraStatusEntry, ModeBody, RecipientBody};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Alert history (newest first)
        .route("/api/alerts", get(list_alerts))
        // Control surface
        .route(
            "/api/security-mode",
            get(get_security_mode).put(set_security_mode),
        )
        .route(
            "/api/alert-recipient",
            get(get_recipient).put(set_recipient),
        )
        // Cameras
        .route("/api/cameras", get(list_cameras))
        .route("/api/cameras/:id/frame", get(latest_frame))
        .with_state(state)
}

/// Current alert history as JSON, newest first
async fn list_alerts(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.alert_log.all().await)
}

async fn get_security_mode(State(state): State<AppState>) -> impl IntoResponse {
    Json(ModeBody {
        mode: state.security_mode.get().await,
    })
}

async fn set_security_mode(
    State(state): State<AppState>,
    Json(body): Json<ModeBody>,
) -> impl IntoResponse {
    state.security_mode.set(body.mode).await;
    Json(body)
}

async fn get_recipient(State(state): State<AppState>) -> impl IntoResponse {
    Json(RecipientBody {
        email: state.recipient.get().await,
    })
}

async fn set_recipient(
    State(state): State<AppState>,
    Json(body): Json<RecipientBody>,
) -> Result<impl IntoResponse> {
    if let Some(email) = &body.email {
        if !email.contains('@') {
            return Err(Error::Validation(format!(
                "'{}' is not an email address",
                email
            )));
        }
    }
    state.recipient.set(body.email.clone()).await;
    Ok(Json(body))
}

/// Configured cameras with their connection status
async fn list_cameras(State(state): State<AppState>) -> impl IntoResponse {
    let mut cameras = Vec::with_capacity(state.config.cameras.len());
    for camera in &state.config.cameras {
        cameras.push(CameraStatusEntry {
            camera_id: camera.camera_id.clone(),
            source: camera.source.clone(),
            status: state.status.get_status(&camera.camera_id).await,
        });
    }
    Json(cameras)
}

/// Most recent stream frame for a camera. Absence is an expected transient
/// state before the first frame arrives.
async fn latest_frame(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse> {
    if !state
        .config
        .cameras
        .iter()
        .any(|c| c.camera_id == camera_id)
    {
        return Err(Error::NotFound(format!("camera '{}'", camera_id)));
    }

    match state.frame_hub.latest(&camera_id).await {
        Some(frame) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], frame.data)),
        None => Err(Error::NotFound(format!(
            "no frame yet for camera '{}'",
            camera_id
        ))),
    }
}
