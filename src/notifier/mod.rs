//! Notification Sinks - Pub/Sub and Email Delivery
//!
//! ## Responsibilities
//!
//! - `AlertSink`: the narrow `deliver(alert) -> ok|failure` contract
//! - Pub/sub publisher: POSTs the serialized record to a topic endpoint
//! - Email notifier: async SMTP, recipient resolved at delivery time
//!
//! Delivery is best-effort on both paths: failures are logged by the
//! caller and never retried.

use crate::alert_log::AlertRecord;
use crate::config::{MailConfig, PubSubConfig};
use crate::error::{Error, Result};
use crate::security_mode::AlertRecipient;
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// An external notification channel consuming finalized alert records
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, record: &AlertRecord) -> Result<()>;
}

/// HTTP publisher pushing alert records to a pub/sub topic endpoint
pub struct PubSubPublisher {
    http: reqwest::Client,
    endpoint: String,
    topic: String,
}

impl PubSubPublisher {
    pub fn new(config: &PubSubConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            endpoint: config.endpoint.clone(),
            topic: config.topic.clone(),
        }
    }
}

#[async_trait]
impl AlertSink for PubSubPublisher {
    fn name(&self) -> &'static str {
        "pubsub"
    }

    async fn deliver(&self, record: &AlertRecord) -> Result<()> {
        let payload = json!({
            "topic": self.topic,
            "alert": record,
        });

        let resp = self.http.post(&self.endpoint).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Api(format!(
                "pub/sub endpoint returned {}",
                resp.status()
            )));
        }

        tracing::debug!(
            topic = %self.topic,
            alert_id = %record.alert_id,
            "Alert published"
        );
        Ok(())
    }
}

/// SMTP notifier; skips delivery when no recipient is set
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
    recipient: Arc<AlertRecipient>,
}

impl EmailNotifier {
    pub fn new(config: &MailConfig, recipient: Arc<AlertRecipient>) -> Result<Self> {
        let sender = config
            .sender
            .clone()
            .ok_or_else(|| Error::Email("MAIL_SENDER/MAIL_USERNAME not configured".to_string()))?;

        let mut builder = if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
        }
        .map_err(|e| Error::Email(format!("SMTP transport setup failed: {}", e)))?
        .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
            recipient,
        })
    }
}

#[async_trait]
impl AlertSink for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, record: &AlertRecord) -> Result<()> {
        let Some(recipient) = self.recipient.get().await else {
            tracing::debug!("No alert recipient set, skipping email");
            return Ok(());
        };

        let (subject, body) = format_alert_email(record);

        let message = Message::builder()
            .from(
                self.sender
                    .parse()
                    .map_err(|e| Error::Email(format!("invalid sender address: {}", e)))?,
            )
            .to(recipient
                .parse()
                .map_err(|e| Error::Email(format!("invalid recipient address: {}", e)))?)
            .subject(subject)
            .body(body)
            .map_err(|e| Error::Email(format!("message build failed: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Email(format!("send failed: {}", e)))?;

        tracing::info!(
            recipient = %recipient,
            alert_id = %record.alert_id,
            "Alert email sent"
        );
        Ok(())
    }
}

/// Subject and plain-text body for an alert email
fn format_alert_email(record: &AlertRecord) -> (String, String) {
    let subject = format!(
        "Security Alert: {} - {} Detected",
        record.alert_type.label(),
        record.class_name
    );

    let body = format!(
        "Security Alert Details:\n\
         -----------------------\n\
         Timestamp: {}\n\
         Camera:    {}\n\
         Type:      {}\n\
         Class:     {}\n\
         Confidence: {:.2}\n\
         \n\
         Check the dashboard for more details and snapshot (if available).\n",
        record.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
        record.camera_id,
        record.alert_type.label(),
        record.class_name,
        record.confidence,
    );

    (subject, body)
}
