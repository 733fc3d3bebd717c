//! MQTT adapter error types.

use housectl_domain::error::TransportError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The session is not established.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The request could not be queued: the queue is full (the broker is
    /// unreachable) or the event loop is gone.
    #[error("MQTT request could not be queued")]
    Unqueued,

    /// The rumqttc client rejected a request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),
}

impl MqttError {
    /// Convert into a [`TransportError`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> TransportError {
        match self {
            Self::NotConnected => TransportError::NotConnected,
            other => TransportError::Client(Box::new(other)),
        }
    }
}

impl From<MqttError> for TransportError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

impl From<rumqttc::ClientError> for MqttError {
    fn from(err: rumqttc::ClientError) -> Self {
        match err {
            rumqttc::ClientError::TryRequest(_) => Self::Unqueued,
            other => Self::Client(other),
        }
    }
}
