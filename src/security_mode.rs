//! Control-surface state: security mode and alert recipient
//!
//! Both are simple guarded scalars, read far more often than written.
//! Only the instantaneous value matters - no queued transitions, no change
//! history. Writes are last-write-wins.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Process-wide security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Alerts only on primary threats
    Standard,
    /// Also alerts on person-class detections
    Full,
}

impl Default for SecurityMode {
    fn default() -> Self {
        Self::Standard
    }
}

/// Guarded security-mode scalar
pub struct SecurityModeState {
    mode: RwLock<SecurityMode>,
}

impl SecurityModeState {
    pub fn new(initial: SecurityMode) -> Self {
        Self {
            mode: RwLock::new(initial),
        }
    }

    pub async fn get(&self) -> SecurityMode {
        *self.mode.read().await
    }

    pub async fn set(&self, mode: SecurityMode) {
        let mut current = self.mode.write().await;
        if *current != mode {
            tracing::info!(mode = ?mode, "Security mode changed");
        }
        *current = mode;
    }
}

impl Default for SecurityModeState {
    fn default() -> Self {
        Self::new(SecurityMode::Standard)
    }
}

/// Guarded alert-recipient scalar, consumed by the email sink at delivery
/// time. `None` disables email delivery without touching throttling state.
pub struct AlertRecipient {
    email: RwLock<Option<String>>,
}

impl AlertRecipient {
    pub fn new() -> Self {
        Self {
            email: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.email.read().await.clone()
    }

    pub async fn set(&self, email: Option<String>) {
        let mut current = self.email.write().await;
        match &email {
            Some(addr) => tracing::info!(recipient = %addr, "Alert recipient set"),
            None => tracing::info!("Alert recipient cleared"),
        }
        *current = email;
    }
}

impl Default for AlertRecipient {
    fn default() -> Self {
        Self::new()
    }
}
