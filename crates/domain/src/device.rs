//! Device — a named actuator and the capability class that decides which
//! commands it accepts.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::motion::{MotionProfile, MotorState};
use crate::state::{AngleState, DeviceState};

/// Servo angle in degrees, always within `0..=180`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u8")]
pub struct Angle(u8);

impl Angle {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(180);

    /// Duty cycle (percent) at 0°.
    const DUTY_MIN: f64 = 2.0;
    /// Duty cycle span (percent) between 0° and 180°.
    const DUTY_SPAN: f64 = 10.0;

    /// Build an angle, rejecting anything above 180°.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AngleOutOfRange`] when `degrees > 180`.
    pub fn new(degrees: u16) -> Result<Self, ValidationError> {
        u8::try_from(degrees)
            .ok()
            .filter(|deg| *deg <= Self::MAX.0)
            .map(Self)
            .ok_or(ValidationError::AngleOutOfRange(degrees))
    }

    #[must_use]
    pub fn degrees(self) -> u8 {
        self.0
    }

    /// Servo PWM duty cycle for this angle: 2 % at 0°, 12 % at 180°.
    #[must_use]
    pub fn duty_cycle(self) -> f64 {
        f64::from(self.0) / 180.0 * Self::DUTY_SPAN + Self::DUTY_MIN
    }
}

impl TryFrom<u16> for Angle {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Angle> for u8 {
    fn from(angle: Angle) -> Self {
        angle.0
    }
}

/// Capability class of a device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceKind {
    /// On/off output (light).
    Binary,
    /// Servo moved between two fixed angles (door).
    Angle { open: Angle, closed: Angle },
    /// Motor, either continuous (fan) or bounded-travel (garage).
    Motion(MotionProfile),
}

/// A controllable device, addressed by `name` on the messaging channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub kind: DeviceKind,
}

impl Device {
    /// Create a device after checking its name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name.
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self { name, kind })
    }

    /// Motion profile for motion devices.
    #[must_use]
    pub fn motion_profile(&self) -> Option<&MotionProfile> {
        match &self.kind {
            DeviceKind::Motion(profile) => Some(profile),
            _ => None,
        }
    }

    /// State at startup: off, closed, or stopped at position 0.
    #[must_use]
    pub fn initial_state(&self) -> DeviceState {
        match &self.kind {
            DeviceKind::Binary => DeviceState::Switch(false),
            DeviceKind::Angle { closed, .. } => DeviceState::Angle(AngleState {
                angle: *closed,
                open: false,
            }),
            DeviceKind::Motion(_) => DeviceState::Motion(MotorState::stopped(0)),
        }
    }

    /// Plain token published on the per-device status topic.
    #[must_use]
    pub fn status_token(&self, state: &DeviceState) -> &'static str {
        match (state, self.motion_profile().and_then(|p| p.travel)) {
            (DeviceState::Motion(motor), Some(travel)) => {
                if motor.position() >= i64::from(travel.steps) {
                    "OPEN"
                } else if motor.position() <= 0 {
                    "CLOSED"
                } else {
                    "PARTIAL"
                }
            }
            (DeviceState::Motion(motor), None) => on_off(motor.running()),
            (DeviceState::Switch(on), _) => on_off(*on),
            (DeviceState::Angle(angle), _) => on_off(angle.open),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}
