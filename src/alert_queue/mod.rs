//! AlertQueue - Bounded Detection Event Channel
//!
//! ## Responsibilities
//!
//! - Carry raw detection events from camera workers to the dispatcher
//! - Never block a producer: `offer` drops the event when the queue is full
//! - Give the single consumer a bounded wait so shutdown stays observable
//!
//! The queue multiplexes, it does not order: events from one camera stay in
//! capture order, events across cameras interleave arbitrarily.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Raw detection event produced by a camera worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub camera_id: String,
    pub class_name: String,
    pub confidence: f32,
    /// [xmin, ymin, xmax, ymax]
    pub bbox: [f32; 4],
    pub is_primary_threat: bool,
    /// Capture timestamp of the originating frame; throttling compares
    /// against this, not dispatcher wall-clock time
    pub captured_at: DateTime<Utc>,
    /// Snapshot filename, when one was persisted
    pub snapshot: Option<String>,
}

/// Create a bounded queue with the given capacity.
pub fn bounded(capacity: usize) -> (AlertProducer, AlertConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (AlertProducer { tx }, AlertConsumer { rx })
}

/// Producer half; cloned into every camera worker
#[derive(Clone)]
pub struct AlertProducer {
    tx: mpsc::Sender<DetectionEvent>,
}

impl AlertProducer {
    /// Non-blocking enqueue. Returns `false` when the event was dropped
    /// (queue full or consumer gone) - acceptable loss under load.
    pub fn offer(&self, event: DetectionEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(ev)) => {
                tracing::trace!(
                    camera_id = %ev.camera_id,
                    class = %ev.class_name,
                    "Alert queue full, dropping detection"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Consumer half; owned by the dispatcher
pub struct AlertConsumer {
    rx: mpsc::Receiver<DetectionEvent>,
}

impl AlertConsumer {
    /// Dequeue one event, waiting at most `wait`. Returns `None` on timeout
    /// (or when every producer is gone); callers re-check the stop signal
    /// and loop.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Option<DetectionEvent> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                // Every producer is gone; pace the caller's stop-signal
                // re-check instead of returning immediately.
                tokio::time::sleep(wait).await;
                None
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(camera_id: &str) -> DetectionEvent {
        DetectionEvent {
            camera_id: camera_id.to_string(),
            class_name: "person".to_string(),
            confidence: 0.9,
            bbox: [0.0, 0.0, 10.0, 10.0],
            is_primary_threat: false,
            captured_at: Utc::now(),
            snapshot: None,
        }
    }

    #[tokio::test]
    async fn offer_never_blocks_at_capacity() {
        let (tx, mut rx) = bounded(5);

        for _ in 0..5 {
            assert!(tx.offer(event("cam1")));
        }
        // Saturated: the extra offer is dropped, not queued
        assert!(!tx.offer(event("cam1")));

        let mut drained = 0;
        while rx.recv_timeout(Duration::from_millis(10)).await.is_some() {
            drained += 1;
        }
        assert_eq!(drained, 5);
    }

    #[tokio::test]
    async fn recv_timeout_returns_none_when_empty() {
        let (_tx, mut rx) = bounded(5);
        let got = rx.recv_timeout(Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn events_dequeue_in_fifo_order() {
        let (tx, mut rx) = bounded(5);
        tx.offer(event("a"));
        tx.offer(event("b"));

        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).await.unwrap().camera_id, "a");
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).await.unwrap().camera_id, "b");
    }
}
