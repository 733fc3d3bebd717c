//! # housectl-adapter-mqtt
//!
//! MQTT adapter — implements the `Transport` port on top of `rumqttc`.
//!
//! ## Responsibilities
//! - Connect to the broker with the configured options and register the
//!   controller's last will
//! - Drive the `rumqttc` event loop in a background task, forwarding every
//!   inbound publish to the controller as a `ControllerEvent`
//! - Report every reconnect so the controller can restore subscriptions and
//!   retained state
//! - Stop once the controller has sent its clean disconnect
//!
//! ## Dependency rule
//! Same as other adapters: depends on `housectl-app` and `housectl-domain`.

pub mod config;
pub mod error;
pub mod session;

pub use config::MqttConfig;
pub use error::MqttError;
pub use session::MqttTransport;
