//! Application state
//!
//! Holds the shared components the API layer reads. Built once at startup;
//! each mutable field carries its own guard.

use crate::alert_log::AlertLog;
use crate::config::AppConfig;
use crate::frame_hub::FrameHub;
use crate::security_mode::{AlertRecipient, SecurityModeState};
use crate::status_tracker::StatusTracker;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration
    pub config: Arc<AppConfig>,
    /// Latest stream frame per camera
    pub frame_hub: Arc<FrameHub>,
    /// In-memory alert history
    pub alert_log: Arc<AlertLog>,
    /// Standard/Full toggle
    pub security_mode: Arc<SecurityModeState>,
    /// Email recipient for the alert sink
    pub recipient: Arc<AlertRecipient>,
    /// Per-camera connection status
    pub status: Arc<StatusTracker>,
}
