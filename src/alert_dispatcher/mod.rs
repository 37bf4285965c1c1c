//! AlertDispatcher - Alert Policy, Throttling and Fan-out
//!
//! ## Responsibilities
//!
//! - Single consumer of the alert queue
//! - Mode-aware alert classification (primary threats always; person-class
//!   detections only in Full mode)
//! - Dispatch throttle gating history + pub/sub per (camera, class) key
//! - Independent, longer email throttle
//! - Best-effort fan-out: pub/sub inline, email on its own task
//!
//! Both throttle maps are owned by the dispatcher task - no locking, the
//! single-consumer design is the synchronization. Throttle comparisons use
//! each event's capture timestamp, not dispatcher wall-clock time.

use crate::alert_log::{AlertLog, AlertRecord, AlertType};
use crate::alert_queue::{AlertConsumer, DetectionEvent};
use crate::config::ThrottlePolicy;
use crate::notifier::AlertSink;
use crate::security_mode::{SecurityMode, SecurityModeState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Rate-limiting key: one throttle window per camera and class
pub type AlertKey = (String, String);

/// Single consumer applying alert policy and fan-out
pub struct AlertDispatcher {
    person_class: String,
    throttle: ThrottlePolicy,
    mode: Arc<SecurityModeState>,
    log: Arc<AlertLog>,
    pubsub: Option<Arc<dyn AlertSink>>,
    email: Option<Arc<dyn AlertSink>>,
    /// Last-fired times for history/pub-sub dispatch (short window)
    dispatch_fired: HashMap<AlertKey, DateTime<Utc>>,
    /// Last-fired times for email (long window, independent of the above)
    email_fired: HashMap<AlertKey, DateTime<Utc>>,
    /// Bounded dequeue wait; what makes shutdown observable
    dequeue_wait: Duration,
}

impl AlertDispatcher {
    pub fn new(
        person_class: String,
        throttle: ThrottlePolicy,
        dequeue_wait: Duration,
        mode: Arc<SecurityModeState>,
        log: Arc<AlertLog>,
        pubsub: Option<Arc<dyn AlertSink>>,
        email: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            person_class,
            throttle,
            mode,
            log,
            pubsub,
            email,
            dispatch_fired: HashMap::new(),
            email_fired: HashMap::new(),
            dequeue_wait,
        }
    }

    /// Consume events until the stop signal fires. Events still queued at
    /// shutdown are dropped - accepted under the best-effort model.
    pub async fn run(mut self, mut events: AlertConsumer, shutdown: watch::Receiver<bool>) {
        tracing::info!("Alert dispatcher started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Bounded wait; a timeout just re-checks the stop signal
            match events.recv_timeout(self.dequeue_wait).await {
                Some(event) => self.handle_event(event).await,
                None => continue,
            }
        }

        tracing::info!("Alert dispatcher stopped");
    }

    /// Apply policy to one event: classify, throttle, record, fan out.
    pub async fn handle_event(&mut self, event: DetectionEvent) {
        let Some(alert_type) = self.classify(&event).await else {
            return;
        };

        let key: AlertKey = (event.camera_id.clone(), event.class_name.clone());

        // Dispatch throttle gates everything downstream: a suppressed event
        // leaves no history entry and no email consideration.
        if !Self::throttle_passes(
            &mut self.dispatch_fired,
            &key,
            event.captured_at,
            self.throttle.dispatch_interval,
        ) {
            tracing::debug!(
                camera_id = %event.camera_id,
                class = %event.class_name,
                "Alert suppressed by dispatch throttle"
            );
            return;
        }

        let record = AlertRecord {
            alert_id: Uuid::new_v4(),
            alert_type,
            class_name: event.class_name.clone(),
            confidence: event.confidence,
            bbox: event.bbox,
            camera_id: event.camera_id.clone(),
            captured_at: event.captured_at,
            snapshot: event.snapshot.clone(),
        };

        tracing::info!(
            camera_id = %record.camera_id,
            class = %record.class_name,
            alert_type = ?record.alert_type,
            confidence = record.confidence,
            "Alert recorded"
        );

        self.log.record(record.clone()).await;

        if let Some(sink) = &self.pubsub {
            if let Err(e) = sink.deliver(&record).await {
                tracing::warn!(sink = sink.name(), error = %e, "Alert publish failed");
            }
        }

        // Email throttle is evaluated only for events that passed dispatch,
        // so it can never fire more often - but runs on its own, much longer
        // window. The last-fired time updates even when no sink is
        // configured, matching the check-then-deliver ordering upstream.
        if Self::throttle_passes(
            &mut self.email_fired,
            &key,
            event.captured_at,
            self.throttle.email_interval,
        ) {
            if let Some(sink) = &self.email {
                // Fire and forget: the dispatcher never blocks on network IO
                let sink = sink.clone();
                let record = record.clone();
                tokio::spawn(async move {
                    if let Err(e) = sink.deliver(&record).await {
                        tracing::warn!(sink = sink.name(), error = %e, "Alert email failed");
                    }
                });
            }
        }
    }

    /// Classify the event, reading the mode once - not locked across the
    /// whole decision.
    async fn classify(&self, event: &DetectionEvent) -> Option<AlertType> {
        if event.is_primary_threat {
            return Some(AlertType::ThreatDetected);
        }
        if self.mode.get().await == SecurityMode::Full && event.class_name == self.person_class {
            return Some(AlertType::MotionPerson);
        }
        None
    }

    /// Check one throttle window against the event's own timestamp and
    /// record it as the new last-fired time when it passes.
    fn throttle_passes(
        fired: &mut HashMap<AlertKey, DateTime<Utc>>,
        key: &AlertKey,
        at: DateTime<Utc>,
        interval: chrono::Duration,
    ) -> bool {
        if let Some(last) = fired.get(key) {
            if at.signed_duration_since(*last) < interval {
                return false;
            }
        }
        fired.insert(key.clone(), at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_queue;
    use crate::error::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink that counts deliveries
    struct RecordingSink {
        deliveries: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, _record: &AlertRecord) -> Result<()> {
            self.deliveries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: AlertDispatcher,
        log: Arc<AlertLog>,
        mode: Arc<SecurityModeState>,
        pubsub_count: Arc<AtomicUsize>,
        email_count: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let log = Arc::new(AlertLog::new(50));
        let mode = Arc::new(SecurityModeState::default());
        let pubsub_count = Arc::new(AtomicUsize::new(0));
        let email_count = Arc::new(AtomicUsize::new(0));

        let dispatcher = AlertDispatcher::new(
            "person".to_string(),
            ThrottlePolicy::default(),
            Duration::from_millis(50),
            mode.clone(),
            log.clone(),
            Some(Arc::new(RecordingSink {
                deliveries: pubsub_count.clone(),
            })),
            Some(Arc::new(RecordingSink {
                deliveries: email_count.clone(),
            })),
        );

        Fixture {
            dispatcher,
            log,
            mode,
            pubsub_count,
            email_count,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_770_000_000 + secs, 0).unwrap()
    }

    fn threat_event(timestamp: DateTime<Utc>) -> DetectionEvent {
        DetectionEvent {
            camera_id: "cam1".to_string(),
            class_name: "knife".to_string(),
            confidence: 0.92,
            bbox: [5.0, 5.0, 50.0, 50.0],
            is_primary_threat: true,
            captured_at: timestamp,
            snapshot: Some("snap.jpg".to_string()),
        }
    }

    fn person_event(timestamp: DateTime<Utc>) -> DetectionEvent {
        DetectionEvent {
            camera_id: "cam1".to_string(),
            class_name: "person".to_string(),
            confidence: 0.8,
            bbox: [0.0, 0.0, 10.0, 10.0],
            is_primary_threat: false,
            captured_at: timestamp,
            snapshot: None,
        }
    }

    /// Wait for fire-and-forget email tasks to settle
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn dispatch_throttle_gates_history_per_key() {
        let mut fx = fixture();

        // 2.0s window: t=100 fires, t=101 is suppressed, t=103 fires again
        fx.dispatcher.handle_event(threat_event(at(100))).await;
        fx.dispatcher.handle_event(threat_event(at(101))).await;
        fx.dispatcher.handle_event(threat_event(at(103))).await;
        settle().await;

        assert_eq!(fx.log.count().await, 2);
        assert_eq!(fx.pubsub_count.load(Ordering::SeqCst), 2);

        let history = fx.log.all().await;
        assert_eq!(history[0].captured_at, at(103));
        assert_eq!(history[1].captured_at, at(100));
    }

    #[tokio::test]
    async fn email_throttle_is_independent_and_longer() {
        let mut fx = fixture();

        // Both pass the 2s dispatch window; only the first passes the 60s
        // email window
        fx.dispatcher.handle_event(threat_event(at(100))).await;
        fx.dispatcher.handle_event(threat_event(at(103))).await;
        settle().await;

        assert_eq!(fx.log.count().await, 2);
        assert_eq!(fx.pubsub_count.load(Ordering::SeqCst), 2);
        assert_eq!(fx.email_count.load(Ordering::SeqCst), 1);

        // Past the email window the next alert emails again
        fx.dispatcher.handle_event(threat_event(at(165))).await;
        settle().await;
        assert_eq!(fx.email_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn person_alerts_require_full_mode() {
        let mut fx = fixture();

        // Standard mode: person detections are not alerts
        fx.dispatcher.handle_event(person_event(at(100))).await;
        settle().await;
        assert_eq!(fx.log.count().await, 0);
        assert_eq!(fx.pubsub_count.load(Ordering::SeqCst), 0);

        // Full mode: same detection becomes a MotionPerson alert
        fx.mode.set(SecurityMode::Full).await;
        fx.dispatcher.handle_event(person_event(at(110))).await;
        settle().await;

        let history = fx.log.all().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].alert_type, AlertType::MotionPerson);
    }

    #[tokio::test]
    async fn primary_threats_alert_in_standard_mode() {
        let mut fx = fixture();

        fx.dispatcher.handle_event(threat_event(at(100))).await;
        settle().await;

        let history = fx.log.all().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].alert_type, AlertType::ThreatDetected);
        assert_eq!(history[0].snapshot.as_deref(), Some("snap.jpg"));
    }

    #[tokio::test]
    async fn throttle_keys_are_per_camera_and_class() {
        let mut fx = fixture();

        let mut other_camera = threat_event(at(100));
        other_camera.camera_id = "cam2".to_string();
        let mut other_class = threat_event(at(100));
        other_class.class_name = "gun".to_string();

        fx.dispatcher.handle_event(threat_event(at(100))).await;
        fx.dispatcher.handle_event(other_camera).await;
        fx.dispatcher.handle_event(other_class).await;
        settle().await;

        // Distinct keys do not throttle each other
        assert_eq!(fx.log.count().await, 3);
    }

    #[tokio::test]
    async fn non_alert_classes_are_discarded() {
        let mut fx = fixture();

        let mut event = person_event(at(100));
        event.class_name = "bicycle".to_string();

        fx.mode.set(SecurityMode::Full).await;
        fx.dispatcher.handle_event(event).await;
        settle().await;

        assert_eq!(fx.log.count().await, 0);
    }

    #[tokio::test]
    async fn run_loop_honors_shutdown_within_dequeue_wait() {
        let fx = fixture();
        let (_producer, consumer) = alert_queue::bounded(10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(fx.dispatcher.run(consumer, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("dispatcher must stop after the bounded dequeue wait")
            .unwrap();
    }

    #[tokio::test]
    async fn run_loop_processes_queued_events() {
        let fx = fixture();
        let log = fx.log.clone();
        let (producer, consumer) = alert_queue::bounded(10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(fx.dispatcher.run(consumer, shutdown_rx));

        producer.offer(threat_event(at(100)));
        producer.offer(threat_event(at(110)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(log.count().await, 2);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
