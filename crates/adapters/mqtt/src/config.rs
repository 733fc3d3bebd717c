//! MQTT connection configuration.

use serde::Deserialize;

/// Configuration for the broker session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Capacity of the outgoing request queue.
    pub request_capacity: usize,
    /// Pause between reconnection attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "housectl".to_string(),
            keep_alive_secs: 60,
            request_capacity: 64,
            reconnect_delay_ms: 1000,
        }
    }
}
