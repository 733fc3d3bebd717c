//! Transport port — publish/subscribe messaging with the outside world.

use std::future::Future;
use std::sync::Arc;

use housectl_domain::error::TransportError;

/// A message to hand to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
    /// Whether the broker should keep the message for late subscribers.
    pub retain: bool,
}

impl OutboundMessage {
    /// A message the broker keeps as the topic's last value.
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }

    /// A message delivered only to current subscribers.
    pub fn transient(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }
}

/// Anything that can publish a message.
///
/// Split from [`Transport`] so the HTTP bridge can publish without owning
/// the subscription side.
pub trait MessagePublisher: Send + Sync {
    /// Publish one message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the message could not be queued.
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Full broker session used by the controller.
pub trait Transport: MessagePublisher {
    /// Subscribe to an exact topic.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request could not be queued.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the session is currently connected.
    fn is_connected(&self) -> bool;

    /// Close the session cleanly (no last-will delivery).
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request could not be queued.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: MessagePublisher + ?Sized> MessagePublisher for Arc<T> {
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).publish(message)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).subscribe(topic)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).disconnect()
    }
}
