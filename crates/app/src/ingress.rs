//! Ingress triage — sits between the transport and the dispatcher.
//!
//! A `STOP` addressed to a motion device engages that device's emergency
//! stop the moment it arrives, before it waits behind a long travel in the
//! dispatch queue. Every event is then forwarded unchanged, so the queued
//! `STOP` still runs through the dispatcher and clears the flag.

use std::collections::HashMap;

use housectl_domain::command::MotionCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::motor::EmergencyStop;

/// A `(topic, payload)` pair received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Everything the transport adapter feeds into the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Command(InboundMessage),
    /// The session was re-established; subscriptions and retained state
    /// must be restored.
    Reconnected,
}

/// Spawn the triage task. It ends when `inbound` closes, which in turn
/// closes `dispatch`.
pub(crate) fn spawn_triage(
    mut inbound: mpsc::Receiver<ControllerEvent>,
    dispatch: mpsc::UnboundedSender<ControllerEvent>,
    stops: HashMap<String, EmergencyStop>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = inbound.recv().await {
            if let ControllerEvent::Command(message) = &event
                && let Some(stop) = stops.get(&message.topic)
                && MotionCommand::parse(&message.payload) == Ok(MotionCommand::Stop)
            {
                stop.engage();
                tracing::warn!(topic = %message.topic, "emergency stop engaged");
            }
            if dispatch.send(event).is_err() {
                break;
            }
        }
        tracing::debug!("inbound channel closed");
    })
}
