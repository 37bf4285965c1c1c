//! SnapshotStore - Snapshot Persistence
//!
//! ## Responsibilities
//!
//! - Derive snapshot filenames from camera, timestamp and class
//! - Persist annotated frames to the snapshot directory
//!
//! Persistence failure is never fatal: the caller logs it and the event
//! goes out without a snapshot reference.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs;

/// Filesystem-backed snapshot store
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create the store, ensuring the snapshot directory exists.
    /// Directory creation failure is a startup error.
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Snapshot filename: `cam{id}_{YYYYmmdd_HHMMSS}_{class}.jpg`
    pub fn snapshot_name(
        camera_id: &str,
        captured_at: DateTime<Utc>,
        class_name: &str,
    ) -> String {
        let ts = captured_at.format("%Y%m%d_%H%M%S");
        format!(
            "cam{}_{}_{}.jpg",
            sanitize(camera_id),
            ts,
            sanitize(class_name)
        )
    }

    /// Persist an image under the given name, returning the full path.
    pub async fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, data)
            .await
            .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "Saved snapshot"
        );

        Ok(path)
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

/// Keep filenames portable: class names like "brass knuckles" carry spaces.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
