//! Vigil Camserver - Multi-Camera Threat Monitoring
//!
//! Main entry point: wires configuration, the detection engine, camera
//! workers, the alert dispatcher and the HTTP API together.

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_camserver::{
    alert_dispatcher::AlertDispatcher,
    alert_log::AlertLog,
    alert_queue,
    camera_worker::CameraWorker,
    capture::{CaptureSource, FfmpegSource},
    config::AppConfig,
    detector::{Detector, HttpDetector},
    frame_hub::FrameHub,
    lifecycle::LifecycleController,
    notifier::{AlertSink, EmailNotifier, PubSubPublisher},
    security_mode::{AlertRecipient, SecurityModeState},
    snapshot_store::SnapshotStore,
    state::AppState,
    status_tracker::StatusTracker,
    web_api,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_camserver=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Vigil Camserver v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(
        cameras = config.cameras.len(),
        detector_url = %config.detector_url,
        snapshot_dir = %config.snapshot_dir.display(),
        frame_skip = config.detection.detect_every_n_frames,
        "Configuration loaded"
    );

    // The detection engine is the one fatal dependency: a monitoring
    // process without it is not worth starting.
    let detector: Arc<dyn Detector> = Arc::new(
        HttpDetector::connect(config.detector_url.clone(), config.detection.clone()).await?,
    );

    let snapshots = Arc::new(SnapshotStore::new(config.snapshot_dir.clone()).await?);
    tracing::info!(dir = %config.snapshot_dir.display(), "SnapshotStore initialized");

    let frame_hub = Arc::new(FrameHub::new());
    let alert_log = Arc::new(AlertLog::new(config.history_capacity));
    let security_mode = Arc::new(SecurityModeState::default());
    let recipient = Arc::new(AlertRecipient::new());
    let status = Arc::new(StatusTracker::new());

    let (producer, consumer) = alert_queue::bounded(config.queue_capacity);

    // Notification sinks are optional; the pipeline runs without them
    let pubsub: Option<Arc<dyn AlertSink>> = config.pubsub.as_ref().map(|c| {
        tracing::info!(endpoint = %c.endpoint, topic = %c.topic, "Pub/sub publisher enabled");
        Arc::new(PubSubPublisher::new(c)) as Arc<dyn AlertSink>
    });

    let email: Option<Arc<dyn AlertSink>> = if config.mail.enabled {
        match EmailNotifier::new(&config.mail, recipient.clone()) {
            Ok(notifier) => {
                tracing::info!(server = %config.mail.server, "Email notifier enabled");
                Some(Arc::new(notifier) as Arc<dyn AlertSink>)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Email notifier disabled (incomplete mail config)");
                None
            }
        }
    } else {
        tracing::info!("Email notifier disabled");
        None
    };

    let mut lifecycle = LifecycleController::new(config.join_timeout);

    // Dispatcher first, then the workers that feed it
    let dispatcher = AlertDispatcher::new(
        config.detection.person_class.clone(),
        config.throttle.clone(),
        config.dequeue_wait,
        security_mode.clone(),
        alert_log.clone(),
        pubsub,
        email,
    );
    let dispatcher_shutdown = lifecycle.subscribe();
    lifecycle.register(
        "alert-dispatcher",
        tokio::spawn(dispatcher.run(consumer, dispatcher_shutdown)),
    );

    for camera in &config.cameras {
        let source: Arc<dyn CaptureSource> = Arc::new(FfmpegSource::new(camera.source.clone()));
        let shutdown = lifecycle.subscribe();
        let worker = CameraWorker::new(
            camera.clone(),
            config.detection.clone(),
            config.timing.clone(),
            source,
            detector.clone(),
            snapshots.clone(),
            frame_hub.clone(),
            producer.clone(),
            status.clone(),
            shutdown,
        );
        lifecycle.register(
            format!("camera-{}", camera.camera_id),
            tokio::spawn(worker.run()),
        );
    }
    tracing::info!(workers = config.cameras.len(), "Camera workers started");

    // Create application state and router
    let state = AppState {
        config: config.clone(),
        frame_hub,
        alert_log,
        security_mode,
        recipient,
        status,
    };

    let app = web_api::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop workers and the dispatcher; queued events may be lost, accepted
    // under the best-effort delivery model
    lifecycle.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
