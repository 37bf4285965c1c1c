//! Frame capture from camera sources
//!
//! ## Responsibilities
//!
//! - Abstract the capture device behind `CaptureSource`/`CaptureStream`
//! - Single-frame RTSP grabs via ffmpeg (no long-lived decoder process)
//! - Optional downscale of frames before detection
//!
//! A capture failure is always `Error::Capture` so the camera worker can
//! distinguish routine device loss (release and retry) from unexpected
//! failures (longer backoff).

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Cursor;
use std::time::Duration;
use tokio::process::Command;

/// Default ffmpeg grab timeout in seconds
const DEFAULT_GRAB_TIMEOUT_SECS: u64 = 10;

/// A single captured or annotated frame (encoded JPEG bytes)
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
        }
    }
}

/// A camera source that can be opened into a live stream
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Open the device. Failure here maps to the worker's `Connecting`
    /// state failing back to `Disconnected`.
    async fn open(&self) -> Result<Box<dyn CaptureStream>>;
}

/// An open capture stream yielding frames one at a time
#[async_trait]
pub trait CaptureStream: Send {
    async fn read_frame(&mut self) -> Result<Frame>;
}

/// RTSP/file source backed by one-shot ffmpeg frame grabs
///
/// Each read spawns an ffmpeg child that decodes exactly one frame to a
/// JPEG on stdout. `kill_on_drop` guarantees the child is reaped when the
/// grab times out, so unresponsive cameras cannot accumulate zombie
/// processes.
pub struct FfmpegSource {
    source: String,
    grab_timeout: Duration,
}

impl FfmpegSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            grab_timeout: Duration::from_secs(DEFAULT_GRAB_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(source: impl Into<String>, grab_timeout: Duration) -> Self {
        Self {
            source: source.into(),
            grab_timeout,
        }
    }

    async fn grab_frame(source: &str, grab_timeout: Duration) -> Result<Frame> {
        use std::process::Stdio;

        let mut cmd = Command::new("ffmpeg");
        if source.starts_with("rtsp://") {
            cmd.args(["-rtsp_transport", "tcp"]);
        }
        let child = cmd
            .args([
                "-i", source,
                "-frames:v", "1",
                "-f", "image2pipe",
                "-vcodec", "mjpeg",
                "-loglevel", "error",
                "-y",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(grab_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(Error::Capture(format!("ffmpeg failed: {}", stderr.trim())));
                }
                if output.stdout.is_empty() {
                    return Err(Error::Capture("ffmpeg returned empty output".to_string()));
                }
                Ok(Frame::new(output.stdout))
            }
            Ok(Err(e)) => Err(Error::Capture(format!("ffmpeg execution failed: {}", e))),
            Err(_) => {
                // The cancelled future drops the Child; kill_on_drop reaps it.
                Err(Error::Capture(format!(
                    "ffmpeg timeout ({}s)",
                    grab_timeout.as_secs()
                )))
            }
        }
    }
}

#[async_trait]
impl CaptureSource for FfmpegSource {
    async fn open(&self) -> Result<Box<dyn CaptureStream>> {
        // Probe with a real grab so "device opened" means frames flow.
        let first = Self::grab_frame(&self.source, self.grab_timeout).await?;
        Ok(Box::new(FfmpegStream {
            source: self.source.clone(),
            grab_timeout: self.grab_timeout,
            pending: Some(first),
        }))
    }
}

struct FfmpegStream {
    source: String,
    grab_timeout: Duration,
    pending: Option<Frame>,
}

#[async_trait]
impl CaptureStream for FfmpegStream {
    async fn read_frame(&mut self) -> Result<Frame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        FfmpegSource::grab_frame(&self.source, self.grab_timeout).await
    }
}

/// Downscale a frame to the detection resolution.
///
/// Callers fall back to the original frame on failure; this never needs to
/// be fatal.
pub fn resize_for_detection(frame: &Frame, width: u32, height: u32) -> Result<Frame> {
    let img = image::load_from_memory(&frame.data)?;
    let resized = img.resize_exact(width, height, image::imageops::FilterType::Triangle);

    let mut buf = Vec::new();
    resized.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?;

    Ok(Frame {
        data: buf,
        captured_at: frame.captured_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn encoded_frame(width: u32, height: u32) -> Frame {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([40, 80, 120]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        Frame::new(buf)
    }

    #[test]
    fn resize_produces_target_dimensions() {
        let frame = encoded_frame(320, 240);
        let resized = resize_for_detection(&frame, 160, 120).unwrap();
        let img = image::load_from_memory(&resized.data).unwrap();
        assert_eq!(img.width(), 160);
        assert_eq!(img.height(), 120);
        // Capture timestamp is preserved through the resize
        assert_eq!(resized.captured_at, frame.captured_at);
    }

    #[test]
    fn resize_fails_on_garbage_input() {
        let frame = Frame::new(vec![0u8; 16]);
        assert!(resize_for_detection(&frame, 160, 120).is_err());
    }
}
