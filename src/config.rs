//! Application configuration
//!
//! Built once from the environment at startup and never mutated afterwards.
//! Every component receives a shared reference; there is no runtime config
//! reload path.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// A single configured camera source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_id: String,
    /// Source locator (RTSP URL, device path, video file)
    pub source: String,
}

/// Detection scheduling and classification policy
#[derive(Debug, Clone)]
pub struct DetectionPolicy {
    /// Minimum confidence for a detection to be reported
    pub confidence_threshold: f32,
    /// Classes that alert regardless of security mode
    pub primary_threat_classes: HashSet<String>,
    /// Class name used to identify people
    pub person_class: String,
    /// Run detection only on every Nth frame when enabled
    pub frame_skip_enabled: bool,
    pub detect_every_n_frames: u64,
    /// Downscale frames to this size before detection when enabled
    pub resize_enabled: bool,
    pub detect_width: u32,
    pub detect_height: u32,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            primary_threat_classes: [
                "gun", "knife", "weapon", "explosive", "bomb", "bat", "machete", "sword",
                "axe", "spear", "crossbow", "club",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            person_class: "person".to_string(),
            frame_skip_enabled: true,
            detect_every_n_frames: 3,
            resize_enabled: true,
            detect_width: 640,
            detect_height: 480,
        }
    }
}

/// Alert throttling windows, keyed by (camera, class)
#[derive(Debug, Clone)]
pub struct ThrottlePolicy {
    /// Minimum interval between recorded/published alerts for the same key
    pub dispatch_interval: chrono::Duration,
    /// Minimum interval between emailed alerts for the same key
    pub email_interval: chrono::Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            dispatch_interval: chrono::Duration::milliseconds(2000),
            email_interval: chrono::Duration::seconds(60),
        }
    }
}

/// Camera worker timing knobs
#[derive(Debug, Clone)]
pub struct WorkerTiming {
    /// Delay before reconnecting after a capture failure
    pub retry_delay: Duration,
    /// Per-iteration yield while streaming
    pub idle_delay: Duration,
}

impl Default for WorkerTiming {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            idle_delay: Duration::from_millis(10),
        }
    }
}

/// SMTP settings for the email sink
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    /// STARTTLS when true, implicit TLS otherwise
    pub use_starttls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: "smtp.googlemail.com".to_string(),
            port: 587,
            use_starttls: true,
            username: None,
            password: None,
            sender: None,
        }
    }
}

/// Pub/sub publisher settings; absent when no endpoint is configured
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    /// Endpoint the serialized alert record is POSTed to
    pub endpoint: String,
    pub topic: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Configured camera sources
    pub cameras: Vec<CameraConfig>,
    /// Detection engine URL
    pub detector_url: String,
    /// Snapshot directory
    pub snapshot_dir: PathBuf,
    pub detection: DetectionPolicy,
    pub throttle: ThrottlePolicy,
    pub timing: WorkerTiming,
    /// Bounded alert queue capacity
    pub queue_capacity: usize,
    /// In-memory alert history capacity
    pub history_capacity: usize,
    /// Bounded dispatcher dequeue wait (makes shutdown observable)
    pub dequeue_wait: Duration,
    /// Per-worker join timeout at shutdown
    pub join_timeout: Duration,
    pub mail: MailConfig,
    pub pubsub: Option<PubSubConfig>,
}

impl AppConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let cameras = match std::env::var("CAMERA_SOURCES") {
            Ok(raw) => parse_camera_sources(&raw)?,
            Err(_) => Vec::new(),
        };

        if cameras.is_empty() {
            tracing::warn!("No camera sources configured (CAMERA_SOURCES empty)");
        }

        let detection = DetectionPolicy {
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", 0.5),
            primary_threat_classes: std::env::var("PRIMARY_THREAT_CLASSES")
                .map(|raw| {
                    raw.split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| DetectionPolicy::default().primary_threat_classes),
            person_class: env_or("PERSON_CLASS_NAME", "person"),
            frame_skip_enabled: env_parse("ENABLE_FRAME_SKIPPING", true),
            detect_every_n_frames: env_parse("DETECT_EVERY_N_FRAMES", 3u64).max(1),
            resize_enabled: env_parse("ENABLE_RESIZING", true),
            detect_width: env_parse("DETECT_WIDTH", 640u32),
            detect_height: env_parse("DETECT_HEIGHT", 480u32),
        };

        let throttle = ThrottlePolicy {
            dispatch_interval: secs_f64_to_duration(env_parse("ALERT_INTERVAL_SECS", 2.0f64)),
            email_interval: secs_f64_to_duration(env_parse("MAIL_ALERT_INTERVAL_SECS", 60.0f64)),
        };

        let mail = MailConfig {
            enabled: env_parse("MAIL_ENABLED", false),
            server: env_or("MAIL_SERVER", "smtp.googlemail.com"),
            port: env_parse("MAIL_PORT", 587u16),
            use_starttls: env_parse("MAIL_USE_TLS", true),
            username: std::env::var("MAIL_USERNAME").ok(),
            password: std::env::var("MAIL_PASSWORD").ok(),
            sender: std::env::var("MAIL_SENDER")
                .ok()
                .or_else(|| std::env::var("MAIL_USERNAME").ok()),
        };

        let pubsub = std::env::var("ALERT_PUBLISH_URL").ok().map(|endpoint| PubSubConfig {
            endpoint,
            topic: env_or("ALERT_TOPIC", "iot/alerts"),
        });

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 8080u16),
            cameras,
            detector_url: env_or("DETECTOR_URL", "http://localhost:9000"),
            snapshot_dir: PathBuf::from(env_or("SNAPSHOT_DIR", "/var/lib/vigil/snapshots")),
            detection,
            throttle,
            timing: WorkerTiming {
                retry_delay: Duration::from_secs(env_parse("CAPTURE_RETRY_DELAY_SECS", 5u64)),
                idle_delay: Duration::from_millis(env_parse("WORKER_IDLE_DELAY_MS", 10u64)),
            },
            queue_capacity: env_parse("ALERT_QUEUE_CAPACITY", 100usize),
            history_capacity: env_parse("MAX_ALERT_HISTORY", 50usize),
            dequeue_wait: Duration::from_millis(env_parse("DISPATCH_DEQUEUE_WAIT_MS", 1000u64)),
            join_timeout: Duration::from_secs(env_parse("WORKER_JOIN_TIMEOUT_SECS", 5u64)),
            mail,
            pubsub,
        })
    }
}

/// Parse `CAMERA_SOURCES` entries: comma-separated `id=locator` pairs.
/// Entries without an id get a positional `cam{N}` identifier.
fn parse_camera_sources(raw: &str) -> Result<Vec<CameraConfig>> {
    let mut cameras = Vec::new();
    for (idx, entry) in raw.split(',').map(str::trim).enumerate() {
        if entry.is_empty() {
            continue;
        }
        let (camera_id, source) = match entry.split_once('=') {
            Some((id, src)) => (id.trim().to_string(), src.trim().to_string()),
            None => (format!("cam{}", idx), entry.to_string()),
        };
        if source.is_empty() {
            return Err(Error::Config(format!(
                "camera '{}' has an empty source locator",
                camera_id
            )));
        }
        if cameras.iter().any(|c: &CameraConfig| c.camera_id == camera_id) {
            return Err(Error::Config(format!("duplicate camera id '{}'", camera_id)));
        }
        cameras.push(CameraConfig { camera_id, source });
    }
    Ok(cameras)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secs_f64_to_duration(secs: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((secs * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_named_sources() {
        let cameras =
            parse_camera_sources("entrance=rtsp://cam1/stream, yard=rtsp://cam2/stream").unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].camera_id, "entrance");
        assert_eq!(cameras[0].source, "rtsp://cam1/stream");
        assert_eq!(cameras[1].camera_id, "yard");
    }

    #[test]
    fn parse_positional_sources() {
        let cameras = parse_camera_sources("/dev/video0,/dev/video1").unwrap();
        assert_eq!(cameras[0].camera_id, "cam0");
        assert_eq!(cameras[1].camera_id, "cam1");
    }

    #[test]
    fn parse_rejects_duplicates() {
        let result = parse_camera_sources("a=rtsp://x,a=rtsp://y");
        assert!(result.is_err());
    }

    #[test]
    fn parse_rejects_empty_source() {
        let result = parse_camera_sources("a=");
        assert!(result.is_err());
    }

    #[test]
    fn default_policy_matches_contract() {
        let policy = DetectionPolicy::default();
        assert_eq!(policy.detect_every_n_frames, 3);
        assert!(policy.primary_threat_classes.contains("knife"));
        assert_eq!(policy.person_class, "person");

        let throttle = ThrottlePolicy::default();
        assert!(throttle.email_interval > throttle.dispatch_interval);
    }
}
