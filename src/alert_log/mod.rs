//! AlertLog - Alert Recording (Ring Buffer)
//!
//! ## Responsibilities
//!
//! - Store finalized alert records newest-first
//! - Enforce the history capacity structurally (insert evicts the oldest)
//! - Provide history queries for the API
//!
//! History lives only for the process lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Alert classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ThreatDetected,
    MotionPerson,
}

impl AlertType {
    /// Human-readable label used in notifications
    pub fn label(&self) -> &'static str {
        match self {
            AlertType::ThreatDetected => "Threat Detected",
            AlertType::MotionPerson => "Motion Detected (Person)",
        }
    }
}

/// Finalized alert record; immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_id: Uuid,
    pub alert_type: AlertType,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
    pub camera_id: String,
    pub captured_at: DateTime<Utc>,
    pub snapshot: Option<String>,
}

/// Newest-first ring buffer
struct AlertRing {
    records: VecDeque<AlertRecord>,
    capacity: usize,
}

impl AlertRing {
    fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, record: AlertRecord) {
        self.records.push_front(record);
        while self.records.len() > self.capacity {
            self.records.pop_back();
        }
    }

    fn latest(&self, count: usize) -> Vec<AlertRecord> {
        self.records.iter().take(count).cloned().collect()
    }
}

/// AlertLog instance
pub struct AlertLog {
    buffer: RwLock<AlertRing>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(AlertRing::new(capacity)),
        }
    }

    /// Prepend a record, evicting the oldest when full.
    pub async fn record(&self, record: AlertRecord) {
        let mut buffer = self.buffer.write().await;
        buffer.push(record);
    }

    /// Latest records, newest first
    pub async fn latest(&self, count: usize) -> Vec<AlertRecord> {
        let buffer = self.buffer.read().await;
        buffer.latest(count)
    }

    /// Full history, newest first
    pub async fn all(&self) -> Vec<AlertRecord> {
        let buffer = self.buffer.read().await;
        buffer.latest(buffer.records.len())
    }

    pub async fn count(&self) -> usize {
        let buffer = self.buffer.read().await;
        buffer.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: usize) -> AlertRecord {
        AlertRecord {
            alert_id: Uuid::new_v4(),
            alert_type: AlertType::ThreatDetected,
            class_name: format!("class{}", seq),
            confidence: 0.9,
            bbox: [0.0, 0.0, 1.0, 1.0],
            camera_id: "cam1".to_string(),
            captured_at: Utc::now(),
            snapshot: None,
        }
    }

    #[tokio::test]
    async fn capacity_is_enforced_newest_first() {
        let capacity = 10;
        let log = AlertLog::new(capacity);

        for seq in 0..capacity + 5 {
            log.record(record(seq)).await;
        }

        let all = log.all().await;
        assert_eq!(all.len(), capacity);
        // Newest first: last inserted leads, the 5 oldest are gone
        assert_eq!(all[0].class_name, "class14");
        assert_eq!(all[capacity - 1].class_name, "class5");
    }

    #[tokio::test]
    async fn latest_limits_count() {
        let log = AlertLog::new(10);
        for seq in 0..4 {
            log.record(record(seq)).await;
        }

        let latest = log.latest(2).await;
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].class_name, "class3");
        assert_eq!(latest[1].class_name, "class2");
    }

    #[test]
    fn alert_type_labels() {
        assert_eq!(AlertType::ThreatDetected.label(), "Threat Detected");
        assert_eq!(AlertType::MotionPerson.label(), "Motion Detected (Person)");
    }
}
