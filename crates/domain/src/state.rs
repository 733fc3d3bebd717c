//! Device state store — last-known state of every device.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::device::{Angle, Device};
use crate::motion::MotorState;
use crate::status::{Presence, SystemStatus};
use crate::time::now;

/// Last-known state of a servo-driven device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AngleState {
    pub angle: Angle,
    pub open: bool,
}

/// Last-known state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DeviceState {
    Switch(bool),
    Angle(AngleState),
    Motion(MotorState),
}

impl DeviceState {
    #[must_use]
    pub fn as_motor(&self) -> Option<&MotorState> {
        match self {
            Self::Motion(motor) => Some(motor),
            _ => None,
        }
    }
}

/// Process-wide mapping from device name to [`DeviceState`].
///
/// Owned by the dispatcher, which is the only writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    devices: BTreeMap<String, DeviceState>,
}

impl ControllerState {
    /// Seed the store with the initial (off/closed/stopped) state of each device.
    pub fn new<'a>(devices: impl IntoIterator<Item = &'a Device>) -> Self {
        Self {
            devices: devices
                .into_iter()
                .map(|device| (device.name.clone(), device.initial_state()))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DeviceState> {
        self.devices.get(name)
    }

    #[must_use]
    pub fn motor(&self, name: &str) -> Option<&MotorState> {
        self.get(name).and_then(DeviceState::as_motor)
    }

    /// Record the post-actuation state of `name`, returning the previous one.
    pub fn set(&mut self, name: &str, state: DeviceState) -> Option<DeviceState> {
        self.devices.insert(name.to_string(), state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceState)> {
        self.devices.iter().map(|(name, state)| (name.as_str(), state))
    }

    /// Aggregate snapshot stamped with the current time.
    #[must_use]
    pub fn snapshot(&self, controller: Presence) -> SystemStatus {
        SystemStatus {
            timestamp: now(),
            devices: self.devices.clone(),
            controller,
        }
    }
}
