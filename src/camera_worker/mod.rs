//! CameraWorker - Per-Camera Capture Loop
//!
//! ## Responsibilities
//!
//! - Own one camera's capture/retry state machine
//! - Schedule detection on every Nth frame
//! - Persist snapshots for interesting detections (mode-independent)
//! - Offer detection events to the alert queue without ever blocking
//! - Publish the latest stream frame for viewers
//!
//! ## State machine
//!
//! `Disconnected -> Connecting -> Streaming`, any failure returns to
//! `Disconnected` after a fixed delay; `Stopped` is terminal and reached
//! from any state via the shared stop signal. A routine capture failure
//! waits one retry delay; an out-of-contract error backs off twice as long.
//! Nothing that happens inside the loop terminates the worker.

use crate::alert_queue::{AlertProducer, DetectionEvent};
use crate::capture::{resize_for_detection, CaptureSource, CaptureStream, Frame};
use crate::config::{CameraConfig, DetectionPolicy, WorkerTiming};
use crate::detector::{Detection, Detector};
use crate::error::Error;
use crate::frame_hub::FrameHub;
use crate::snapshot_store::SnapshotStore;
use crate::status_tracker::StatusTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Disconnected,
    Connecting,
    Streaming,
    Stopped,
}

/// One camera's capture/detection loop
pub struct CameraWorker {
    camera: CameraConfig,
    policy: DetectionPolicy,
    timing: WorkerTiming,
    source: Arc<dyn CaptureSource>,
    detector: Arc<dyn Detector>,
    snapshots: Arc<SnapshotStore>,
    frame_hub: Arc<FrameHub>,
    alerts: AlertProducer,
    status: Arc<StatusTracker>,
    shutdown: watch::Receiver<bool>,
    /// Frames captured since startup; persists across reconnects.
    /// Counting starts at 1, so with skip factor K detection runs on the
    /// Kth, 2Kth, ... frames.
    frame_count: u64,
}

impl CameraWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: CameraConfig,
        policy: DetectionPolicy,
        timing: WorkerTiming,
        source: Arc<dyn CaptureSource>,
        detector: Arc<dyn Detector>,
        snapshots: Arc<SnapshotStore>,
        frame_hub: Arc<FrameHub>,
        alerts: AlertProducer,
        status: Arc<StatusTracker>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            camera,
            policy,
            timing,
            source,
            detector,
            snapshots,
            frame_hub,
            alerts,
            status,
            shutdown,
            frame_count: 0,
        }
    }

    /// Run until the stop signal fires. Never returns early: capture
    /// failures cycle back through `Disconnected` indefinitely.
    pub async fn run(mut self) {
        tracing::info!(
            camera_id = %self.camera.camera_id,
            source = %self.camera.source,
            "Camera worker started"
        );

        let mut state = WorkerState::Connecting;
        let mut stream: Option<Box<dyn CaptureStream>> = None;

        loop {
            // Stop signal is observed at loop boundaries only; shutdown is
            // cooperative, not preemptive.
            if *self.shutdown.borrow() {
                state = WorkerState::Stopped;
            }

            match state {
                WorkerState::Stopped => break,

                WorkerState::Disconnected => {
                    self.pause(self.timing.retry_delay).await;
                    state = WorkerState::Connecting;
                }

                WorkerState::Connecting => match self.source.open().await {
                    Ok(live) => {
                        stream = Some(live);
                        self.status.update_status(&self.camera.camera_id, true).await;
                        tracing::info!(camera_id = %self.camera.camera_id, "Camera opened");
                        state = WorkerState::Streaming;
                    }
                    Err(e) => {
                        tracing::warn!(
                            camera_id = %self.camera.camera_id,
                            error = %e,
                            "Could not open camera, retrying"
                        );
                        self.status.update_status(&self.camera.camera_id, false).await;
                        state = WorkerState::Disconnected;
                    }
                },

                WorkerState::Streaming => {
                    let Some(live) = stream.as_mut() else {
                        state = WorkerState::Connecting;
                        continue;
                    };

                    match live.read_frame().await {
                        Ok(frame) => {
                            self.frame_count += 1;
                            self.process_frame(frame).await;
                            self.pause(self.timing.idle_delay).await;
                        }
                        Err(Error::Capture(e)) => {
                            tracing::warn!(
                                camera_id = %self.camera.camera_id,
                                error = %e,
                                "Failed to capture frame, releasing and retrying"
                            );
                            stream = None;
                            self.status.update_status(&self.camera.camera_id, false).await;
                            state = WorkerState::Disconnected;
                        }
                        Err(e) => {
                            // Out-of-contract failure: release the device and
                            // back off twice the normal delay before the
                            // Disconnected wait runs its own.
                            tracing::error!(
                                camera_id = %self.camera.camera_id,
                                error = %e,
                                "Unexpected error in capture loop"
                            );
                            stream = None;
                            self.status.update_status(&self.camera.camera_id, false).await;
                            self.pause(self.timing.retry_delay).await;
                            state = WorkerState::Disconnected;
                        }
                    }
                }
            }
        }

        drop(stream);
        tracing::info!(camera_id = %self.camera.camera_id, "Camera worker stopped");
    }

    /// Handle one captured frame: run or skip detection, then publish the
    /// resulting stream frame.
    async fn process_frame(&self, frame: Frame) {
        let run_detection = !self.policy.frame_skip_enabled
            || self.frame_count % self.policy.detect_every_n_frames == 0;

        let stream_frame = if run_detection {
            self.detect_and_report(&frame).await
        } else {
            // Viewers still see a live, if unannotated, picture
            frame.clone()
        };

        self.frame_hub
            .publish(&self.camera.camera_id, stream_frame)
            .await;
    }

    /// Run detection on the frame and enqueue every resulting event.
    /// Returns the frame this cycle contributes to the stream table.
    async fn detect_and_report(&self, frame: &Frame) -> Frame {
        let to_detect = if self.policy.resize_enabled {
            match resize_for_detection(frame, self.policy.detect_width, self.policy.detect_height)
            {
                Ok(resized) => resized,
                Err(e) => {
                    tracing::warn!(
                        camera_id = %self.camera.camera_id,
                        error = %e,
                        "Frame resize failed, using original"
                    );
                    frame.clone()
                }
            }
        } else {
            frame.clone()
        };

        let (detections, annotated) = self.detector.detect(&to_detect).await.into_parts();

        for detection in &detections {
            let snapshot = self.maybe_snapshot(detection, &annotated).await;

            let event = DetectionEvent {
                camera_id: self.camera.camera_id.clone(),
                class_name: detection.class_name.clone(),
                confidence: detection.confidence,
                bbox: detection.bbox,
                is_primary_threat: detection.is_primary_threat,
                captured_at: frame.captured_at,
                snapshot,
            };

            // Drops silently when the queue is saturated
            self.alerts.offer(event);
        }

        annotated
    }

    /// Persist a snapshot for interesting detections.
    ///
    /// Interesting means primary threat or person class, independent of
    /// security mode: the worker deliberately holds no mode reference at
    /// all. Alert-dispatch policy is the dispatcher's concern.
    async fn maybe_snapshot(&self, detection: &Detection, annotated: &Frame) -> Option<String> {
        let interesting =
            detection.is_primary_threat || detection.class_name == self.policy.person_class;
        if !interesting {
            return None;
        }

        let name = SnapshotStore::snapshot_name(
            &self.camera.camera_id,
            annotated.captured_at,
            &detection.class_name,
        );

        match self.snapshots.save(&name, &annotated.data).await {
            Ok(_) => Some(name),
            Err(e) => {
                tracing::warn!(
                    camera_id = %self.camera.camera_id,
                    snapshot = %name,
                    error = %e,
                    "Failed to persist snapshot"
                );
                None
            }
        }
    }

    /// Sleep, waking early when the stop signal fires.
    async fn pause(&mut self, dur: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(dur) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}
