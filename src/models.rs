//! API response models

use crate::security_mode::SecurityMode;
use crate::status_tracker::CameraConnectionStatus;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cameras_configured: usize,
    pub cameras_offline: usize,
    pub security_mode: SecurityMode,
}

/// One configured camera with its live status
#[derive(Debug, Clone, Serialize)]
pub struct CameraStatusEntry {
    pub camera_id: String,
    pub source: String,
    pub status: CameraConnectionStatus,
}

/// Security-mode read/replace payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: SecurityMode,
}

/// Alert-recipient read/replace payload; `null` clears the recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientBody {
    pub email: Option<String>,
}
