//! Broker session — the `Transport` implementation and its event loop.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use housectl_app::ingress::{ControllerEvent, InboundMessage};
use housectl_app::ports::{MessagePublisher, OutboundMessage, Transport};
use housectl_domain::error::TransportError;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// `Transport` backed by a `rumqttc` client.
///
/// Cheap to clone; every clone shares the same session.
#[derive(Debug, Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttTransport {
    /// Open the session and spawn its event loop.
    ///
    /// `will` is registered with the broker and published by it if the
    /// session ends without a clean disconnect. Inbound publishes and
    /// reconnect notifications are sent to `events`; the event loop task
    /// ends after the clean disconnect or when `events` is closed.
    pub fn connect(
        config: &MqttConfig,
        will: &OutboundMessage,
        events: mpsc::Sender<ControllerEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (client, eventloop) = AsyncClient::new(options(config, will), config.request_capacity);
        let connected = Arc::new(AtomicBool::new(false));
        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            client_id = %config.client_id,
            "connecting to broker"
        );
        let task = tokio::spawn(drive(
            eventloop,
            Arc::clone(&connected),
            events,
            Duration::from_millis(config.reconnect_delay_ms),
        ));
        (Self { client, connected }, task)
    }
}

fn options(config: &MqttConfig, will: &OutboundMessage) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
    options.set_clean_session(true);
    options.set_last_will(LastWill::new(
        &will.topic,
        will.payload.clone(),
        QoS::AtLeastOnce,
        will.retain,
    ));
    options
}

/// What the event loop does with one event.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Connected,
    Inbound(InboundMessage),
    Closed,
    Idle,
}

fn classify(event: Event) -> Step {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => Step::Connected,
        Event::Incoming(Packet::Publish(publish)) => Step::Inbound(InboundMessage::new(
            publish.topic,
            String::from_utf8_lossy(&publish.payload).into_owned(),
        )),
        Event::Outgoing(Outgoing::Disconnect) => Step::Closed,
        _ => Step::Idle,
    }
}

async fn drive(
    mut eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    events: mpsc::Sender<ControllerEvent>,
    retry: Duration,
) {
    let mut sessions: u64 = 0;
    loop {
        let event = match eventloop.poll().await {
            Ok(event) => event,
            Err(err) => {
                if connected.swap(false, Ordering::SeqCst) {
                    tracing::warn!(error = %err, "broker connection lost");
                } else {
                    tracing::debug!(error = %err, "broker unreachable, retrying");
                }
                tokio::time::sleep(retry).await;
                continue;
            }
        };
        let forwarded = match classify(event) {
            Step::Connected => {
                connected.store(true, Ordering::SeqCst);
                sessions += 1;
                tracing::info!(sessions, "connected to broker");
                if sessions > 1 {
                    events.send(ControllerEvent::Reconnected).await
                } else {
                    Ok(())
                }
            }
            Step::Inbound(message) => {
                tracing::debug!(topic = %message.topic, "inbound publish");
                events.send(ControllerEvent::Command(message)).await
            }
            Step::Closed => {
                connected.store(false, Ordering::SeqCst);
                tracing::info!("disconnected from broker");
                break;
            }
            Step::Idle => Ok(()),
        };
        if forwarded.is_err() {
            tracing::debug!("controller stopped listening, closing event loop");
            break;
        }
    }
}

// Requests use the non-blocking `try_*` calls: while the broker is
// unreachable the request queue fills up, and a full queue must surface as a
// `TransportError` instead of parking the caller.
impl MessagePublisher for MqttTransport {
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let queued = self
            .client
            .try_publish(
                message.topic,
                QoS::AtLeastOnce,
                message.retain,
                message.payload.into_bytes(),
            )
            .map_err(|err| MqttError::from(err).into());
        std::future::ready(queued)
    }
}

impl Transport for MqttTransport {
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        let queued = self
            .client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|err| MqttError::from(err).into());
        std::future::ready(queued)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        let queued = self
            .client
            .try_disconnect()
            .map_err(|err| MqttError::from(err).into());
        std::future::ready(queued)
    }
}
