//! Camera Status Tracker
//!
//! Tracks camera connection status changes to detect lost/recovered events.
//! Only transitions are logged to avoid spamming the log on every retry
//! cycle of a dead camera.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Camera connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraConnectionStatus {
    /// Initial state (never connected)
    Unknown,
    /// Capture device is open and delivering frames
    Online,
    /// Capture device is lost; the worker is retrying
    Offline,
}

/// Camera status transition event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatusEvent {
    /// Camera went from Online to Offline
    Lost,
    /// Camera went from Offline to Online
    Recovered,
}

/// Tracks camera connection status and detects transitions
pub struct StatusTracker {
    /// Current status of each camera (camera_id -> status)
    statuses: RwLock<HashMap<String, CameraConnectionStatus>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Update camera status and return the transition event, if any.
    ///
    /// Returns:
    /// - `Some(Lost)` on Online -> Offline, or when the first observed
    ///   status is Offline (initial connect failed)
    /// - `Some(Recovered)` on Offline -> Online
    /// - `None` when nothing changed
    pub async fn update_status(
        &self,
        camera_id: &str,
        is_online: bool,
    ) -> Option<CameraStatusEvent> {
        let mut statuses = self.statuses.write().await;
        let prev = statuses
            .get(camera_id)
            .copied()
            .unwrap_or(CameraConnectionStatus::Unknown);

        let new_status = if is_online {
            CameraConnectionStatus::Online
        } else {
            CameraConnectionStatus::Offline
        };

        statuses.insert(camera_id.to_string(), new_status);

        match (prev, new_status) {
            (CameraConnectionStatus::Online, CameraConnectionStatus::Offline) => {
                tracing::warn!(camera_id = %camera_id, "Camera connection lost");
                Some(CameraStatusEvent::Lost)
            }
            (CameraConnectionStatus::Offline, CameraConnectionStatus::Online) => {
                tracing::info!(camera_id = %camera_id, "Camera connection recovered");
                Some(CameraStatusEvent::Recovered)
            }
            (CameraConnectionStatus::Unknown, CameraConnectionStatus::Offline) => {
                tracing::warn!(
                    camera_id = %camera_id,
                    "Camera initial connect failed - marking as lost"
                );
                Some(CameraStatusEvent::Lost)
            }
            _ => None,
        }
    }

    /// Current status for a camera
    pub async fn get_status(&self, camera_id: &str) -> CameraConnectionStatus {
        self.statuses
            .read()
            .await
            .get(camera_id)
            .copied()
            .unwrap_or(CameraConnectionStatus::Unknown)
    }

    /// All offline cameras
    pub async fn get_offline_cameras(&self) -> Vec<String> {
        self.statuses
            .read()
            .await
            .iter()
            .filter(|(_, status)| **status == CameraConnectionStatus::Offline)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_online_no_event() {
        let tracker = StatusTracker::new();
        let event = tracker.update_status("cam1", true).await;
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn test_initial_offline_triggers_lost() {
        let tracker = StatusTracker::new();
        let event = tracker.update_status("cam1", false).await;
        assert_eq!(event, Some(CameraStatusEvent::Lost));
    }

    #[tokio::test]
    async fn test_online_to_offline_triggers_lost() {
        let tracker = StatusTracker::new();
        tracker.update_status("cam1", true).await;
        let event = tracker.update_status("cam1", false).await;
        assert_eq!(event, Some(CameraStatusEvent::Lost));
    }

    #[tokio::test]
    async fn test_offline_to_online_triggers_recovered() {
        let tracker = StatusTracker::new();
        tracker.update_status("cam1", false).await;
        let event = tracker.update_status("cam1", true).await;
        assert_eq!(event, Some(CameraStatusEvent::Recovered));
    }

    #[tokio::test]
    async fn test_offline_to_offline_no_event() {
        let tracker = StatusTracker::new();
        tracker.update_status("cam1", false).await;
        let event = tracker.update_status("cam1", false).await;
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn test_online_to_online_no_event() {
        let tracker = StatusTracker::new();
        tracker.update_status("cam1", true).await;
        let event = tracker.update_status("cam1", true).await;
        assert!(event.is_none());
    }
}
