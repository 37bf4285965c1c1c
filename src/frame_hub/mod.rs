//! FrameHub - Latest-Frame Table for Streaming
//!
//! ## Responsibilities
//!
//! - Hold the most recent stream frame per camera
//! - Many concurrent writers (one per camera, writing only its own key)
//! - Many concurrent readers
//!
//! A single coarse lock serializes the table; writes are rare next to the
//! CPU cost of detection, so key-level locking buys nothing here. No frame
//! history is kept: each write replaces the prior value.

use crate::capture::Frame;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Shared camera-id -> latest frame mapping
pub struct FrameHub {
    frames: RwLock<HashMap<String, Frame>>,
}

impl FrameHub {
    pub fn new() -> Self {
        Self {
            frames: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the latest frame for a camera.
    pub async fn publish(&self, camera_id: &str, frame: Frame) {
        let mut frames = self.frames.write().await;
        frames.insert(camera_id.to_string(), frame);
    }

    /// Most recent frame for a camera; `None` before the first write is a
    /// valid transient state.
    pub async fn latest(&self, camera_id: &str) -> Option<Frame> {
        let frames = self.frames.read().await;
        frames.get(camera_id).cloned()
    }

    /// Cameras that have published at least one frame
    pub async fn active_cameras(&self) -> Vec<String> {
        let frames = self.frames.read().await;
        frames.keys().cloned().collect()
    }
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_before_first_publish() {
        let hub = FrameHub::new();
        assert!(hub.latest("cam1").await.is_none());
    }

    #[tokio::test]
    async fn publish_replaces_prior_frame() {
        let hub = FrameHub::new();
        hub.publish("cam1", Frame::new(vec![1])).await;
        hub.publish("cam1", Frame::new(vec![2])).await;

        let latest = hub.latest("cam1").await.unwrap();
        assert_eq!(latest.data, vec![2]);
    }

    #[tokio::test]
    async fn cameras_are_isolated() {
        let hub = FrameHub::new();
        hub.publish("cam1", Frame::new(vec![1])).await;
        hub.publish("cam2", Frame::new(vec![2])).await;

        assert_eq!(hub.latest("cam1").await.unwrap().data, vec![1]);
        assert_eq!(hub.latest("cam2").await.unwrap().data, vec![2]);
        assert_eq!(hub.active_cameras().await.len(), 2);
    }
}
