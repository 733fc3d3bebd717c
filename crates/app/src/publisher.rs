//! Status/error publisher — formats every outbound record.
//!
//! Publishing is best-effort: transport failures are logged and never
//! reach the caller. The latest aggregate snapshot is also kept in a
//! `watch` channel so other surfaces (the HTTP bridge) can read it.

use std::error::Error;

use housectl_domain::error::error_chain;
use housectl_domain::status::{ErrorReport, LastWill, MotorDiagnostics, SystemInfo, SystemStatus};
use housectl_domain::time::now;
use serde::Serialize;
use tokio::sync::watch;

use crate::ports::{MessagePublisher, OutboundMessage};
use crate::topics::Topics;

pub struct StatusPublisher<P> {
    transport: P,
    topics: Topics,
    retain_errors: bool,
    feed: watch::Sender<SystemStatus>,
}

impl<P: MessagePublisher> StatusPublisher<P> {
    pub fn new(transport: P, topics: Topics, retain_errors: bool, initial: SystemStatus) -> Self {
        Self {
            transport,
            topics,
            retain_errors,
            feed: watch::Sender::new(initial),
        }
    }

    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Receiver that always holds the latest aggregate snapshot.
    #[must_use]
    pub fn feed(&self) -> watch::Receiver<SystemStatus> {
        self.feed.subscribe()
    }

    /// Retained status token on `<base>/<device>/status`.
    pub async fn device_status(&self, device: &str, token: &str) {
        self.send(OutboundMessage::retained(self.topics.status(device), token))
            .await;
    }

    /// Retained diagnostics on `<base>/<device>/motor_status`.
    pub async fn diagnostics(&self, device: &str, diagnostics: &MotorDiagnostics) {
        self.send_json(self.topics.diagnostics(device), diagnostics, true)
            .await;
    }

    /// Retained aggregate on `<base>/status`.
    pub async fn snapshot(&self, status: SystemStatus) {
        self.send_json(self.topics.aggregate(), &status, true).await;
        self.feed.send_replace(status);
    }

    /// Retained controller info on `<base>/system`.
    pub async fn system(&self, info: &SystemInfo) {
        self.send_json(self.topics.system(), info, true).await;
    }

    /// Error report on `<topic>/error`.
    pub async fn error(
        &self,
        topic: &str,
        err: &(dyn Error + Send + Sync),
        motor_status: Option<MotorDiagnostics>,
    ) {
        let report = ErrorReport {
            error: error_chain(err),
            timestamp: now(),
            topic: topic.to_string(),
            motor_status,
        };
        self.send_json(Topics::error(topic), &report, self.retain_errors)
            .await;
    }

    async fn send_json<T: Serialize + ?Sized>(&self, topic: String, value: &T, retain: bool) {
        match serde_json::to_string(value) {
            Ok(payload) => {
                self.send(OutboundMessage {
                    topic,
                    payload,
                    retain,
                })
                .await;
            }
            Err(err) => tracing::error!(%topic, error = %err, "failed to encode payload"),
        }
    }

    async fn send(&self, message: OutboundMessage) {
        let topic = message.topic.clone();
        if let Err(err) = self.transport.publish(message).await {
            tracing::warn!(%topic, error = %error_chain(&err), "publish failed");
        }
    }
}

/// Last-will message to register with the broker on connect.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if the payload cannot be encoded.
pub fn last_will(topics: &Topics) -> Result<OutboundMessage, serde_json::Error> {
    let payload = serde_json::to_string(&LastWill::default())?;
    Ok(OutboundMessage::retained(topics.system(), payload))
}
