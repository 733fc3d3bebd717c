//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ControllerError`] via `#[from]`.

use std::error::Error;

use crate::signal::Pin;

/// Top-level error for the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("actuation error")]
    Actuation(#[from] ActuationError),

    #[error("transport error")]
    Transport(#[from] TransportError),

    #[error("hardware error")]
    Hardware(#[from] HardwareError),
}

/// A payload or configuration value that does not match what a device accepts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid command '{payload}', expected {expected}")]
    InvalidCommand {
        payload: String,
        expected: &'static str,
    },

    #[error("malformed speed in '{payload}', expected SPEED:<0-100>")]
    MalformedSpeed { payload: String },

    #[error("speed {value} in '{payload}' is out of range 0-100")]
    SpeedOutOfRange { payload: String, value: i64 },

    #[error("command {command} is not supported by {device}")]
    UnsupportedCommand {
        command: &'static str,
        device: String,
    },

    #[error("name must not be empty")]
    EmptyName,

    #[error("device name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("pin {0} is assigned more than once")]
    DuplicatePin(Pin),

    #[error("angle {0} is out of range 0-180")]
    AngleOutOfRange(u16),

    #[error("speed {0} is out of range 0-100")]
    InvalidSpeed(u16),

    #[error("bounded travel on {0} requires a stepper drive")]
    BoundedTravelRequiresStepper(String),

    #[error("travel speed of {0} must be above 0")]
    IdleTravelSpeed(String),

    #[error("full travel of {0} takes too long to schedule")]
    TravelTooLong(String),
}

/// Failure reported by the hardware-abstraction layer.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("pin {0} is not configured as an output")]
    NotConfigured(Pin),

    #[error("pin {0} has no running PWM channel")]
    PwmNotStarted(Pin),

    #[error("I/O failure on pin {pin}")]
    Io {
        pin: Pin,
        #[source]
        source: std::io::Error,
    },

    #[error("hardware resources have been released")]
    Released,
}

/// Failure while driving an actuator.
#[derive(Debug, thiserror::Error)]
pub enum ActuationError {
    #[error("hardware failure while driving {device}")]
    Hardware {
        device: String,
        #[source]
        source: HardwareError,
    },

    #[error("motor worker for {device} is not running")]
    WorkerUnavailable { device: String },

    #[error("{device} is halted by an emergency stop")]
    Halted { device: String },

    #[error("{device} cannot travel a fixed number of steps on a {drive} drive")]
    NotSteppable { device: String, drive: &'static str },
}

/// Failure of the publish/subscribe transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("transport client error")]
    Client(#[source] Box<dyn Error + Send + Sync>),
}

/// Render an error and all of its sources as a single `a: b: c` line.
#[must_use]
pub fn error_chain(err: &dyn Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}
