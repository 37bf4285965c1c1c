//! Detector - Object Detection Adapter
//!
//! ## Responsibilities
//!
//! - Narrow `detect(frame) -> (detections, annotated_frame)` contract
//! - HTTP adapter for the external inference engine
//! - Startup health check (the only fatal failure in the system)
//!
//! The contract never surfaces an error across the boundary: a failed call
//! yields `DetectOutcome::Failed` carrying the input frame, and the caller
//! reacts the same way it would to an empty detection list. The two cases
//! stay distinguishable for future health accounting.

use crate::capture::Frame;
use crate::config::DetectionPolicy;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

/// A single detection reported for a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_name: String,
    /// Confidence in 0..=1
    pub confidence: f32,
    /// [xmin, ymin, xmax, ymax]
    pub bbox: [f32; 4],
    /// Pre-designated always-alert-worthy class
    pub is_primary_threat: bool,
}

/// Result of one detection pass
#[derive(Debug)]
pub enum DetectOutcome {
    /// Detection ran; the list may be empty
    Analyzed {
        detections: Vec<Detection>,
        annotated: Frame,
    },
    /// The detection subsystem failed; callers use the original frame
    Failed { fallback: Frame },
}

impl DetectOutcome {
    /// Frame this cycle contributes to the stream table
    pub fn into_parts(self) -> (Vec<Detection>, Frame) {
        match self {
            DetectOutcome::Analyzed {
                detections,
                annotated,
            } => (detections, annotated),
            DetectOutcome::Failed { fallback } => (Vec::new(), fallback),
        }
    }
}

/// Pluggable detection stage
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> DetectOutcome;
}

/// Wire format of one detection from the inference engine
#[derive(Debug, Deserialize)]
struct WireDetection {
    class: String,
    confidence: f32,
    bbox: [f32; 4],
}

/// Wire format of the inference response
#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<WireDetection>,
    /// Annotated frame as base64 JPEG; absent when the engine drew nothing
    #[serde(default)]
    annotated_image: Option<String>,
}

/// HTTP adapter for the external detection engine
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
    policy: DetectionPolicy,
}

impl HttpDetector {
    /// Connect to the detection engine and verify it is reachable.
    ///
    /// This is the one place a failure aborts startup: a monitoring process
    /// without a detection engine is not worth running.
    pub async fn connect(base_url: impl Into<String>, policy: DetectionPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(Error::Http)?;

        let detector = Self {
            client,
            base_url: base_url.into(),
            policy,
        };

        detector.health_check().await.map_err(|e| {
            Error::Detection(format!(
                "detection engine unreachable at {}: {}",
                detector.base_url, e
            ))
        })?;

        tracing::info!(base_url = %detector.base_url, "Detection engine connected");
        Ok(detector)
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/healthz", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Api(format!("health check returned {}", resp.status())));
        }
        Ok(())
    }

    async fn request_detection(&self, frame: &Frame) -> Result<DetectResponse> {
        let url = format!("{}/api/detect", self.base_url);

        let part = reqwest::multipart::Part::bytes(frame.data.clone())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(Error::Http)?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text(
                "confidence_threshold",
                self.policy.confidence_threshold.to_string(),
            );

        let resp = self.client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Api(format!(
                "detection request returned {}",
                resp.status()
            )));
        }

        Ok(resp.json().await?)
    }

    fn decode_annotated(&self, resp: &DetectResponse, original: &Frame) -> Frame {
        match resp.annotated_image.as_deref() {
            Some(b64) => match base64::engine::general_purpose::STANDARD.decode(b64) {
                Ok(data) => Frame {
                    data,
                    captured_at: original.captured_at,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Annotated frame decode failed, using original");
                    original.clone()
                }
            },
            None => original.clone(),
        }
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, frame: &Frame) -> DetectOutcome {
        let resp = match self.request_detection(frame).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "Detection call failed");
                return DetectOutcome::Failed {
                    fallback: frame.clone(),
                };
            }
        };

        let annotated = self.decode_annotated(&resp, frame);
        let detections = resp
            .detections
            .into_iter()
            .filter(|d| d.confidence >= self.policy.confidence_threshold)
            .map(|d| Detection {
                is_primary_threat: self.policy.primary_threat_classes.contains(&d.class),
                class_name: d.class,
                confidence: d.confidence,
                bbox: d.bbox,
            })
            .collect();

        DetectOutcome::Analyzed {
            detections,
            annotated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_parts_on_failure_fall_back_to_input() {
        let frame = Frame::new(vec![1, 2, 3]);
        let outcome = DetectOutcome::Failed {
            fallback: frame.clone(),
        };
        let (detections, stream_frame) = outcome.into_parts();
        assert!(detections.is_empty());
        assert_eq!(stream_frame.data, frame.data);
    }

    #[test]
    fn wire_response_tolerates_missing_fields() {
        let resp: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.detections.is_empty());
        assert!(resp.annotated_image.is_none());

        let resp: DetectResponse = serde_json::from_str(
            r#"{"detections":[{"class":"person","confidence":0.9,"bbox":[1.0,2.0,3.0,4.0]}]}"#,
        )
        .unwrap();
        assert_eq!(resp.detections.len(), 1);
        assert_eq!(resp.detections[0].class, "person");
    }
}
