//! Vigil Camserver Library
//!
//! Concurrent camera-capture pipeline and alert-dispatch engine.
//!
//! ## Architecture (10 Components)
//!
//! 1. Capture - camera sources behind `CaptureSource`/`CaptureStream`
//! 2. Detector - pluggable object-detection stage (HTTP adapter)
//! 3. FrameHub - latest annotated frame per camera for streaming
//! 4. SnapshotStore - snapshot persistence for interesting detections
//! 5. CameraWorker - per-source capture/retry loop with frame skipping
//! 6. AlertQueue - bounded event channel, drop-on-saturation
//! 7. AlertDispatcher - mode-aware policy, throttling, history, fan-out
//! 8. NotificationSinks - pub/sub publisher and email notifier
//! 9. LifecycleController - startup and cooperative shutdown
//! 10. WebAPI - control and read surfaces
//!
//! ## Design Principles
//!
//! - Drop, never block: producers always prefer losing an event to
//!   stalling a capture loop
//! - Recover at the lowest layer: nothing past startup kills a worker
//! - One execution context per camera, one for the dispatcher

pub mod alert_dispatcher;
pub mod alert_log;
pub mod alert_queue;
pub mod camera_worker;
pub mod capture;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame_hub;
pub mod lifecycle;
pub mod models;
pub mod notifier;
pub mod security_mode;
pub mod snapshot_store;
pub mod state;
pub mod status_tracker;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
