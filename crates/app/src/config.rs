//! Controller configuration — the `[controller]` section.
//!
//! Values arrive as plain numbers so that a partial file still deserializes;
//! [`ControllerConfig::blueprint`] then validates everything and builds the
//! typed domain devices together with their pin wiring.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use housectl_domain::device::{Angle, Device, DeviceKind};
use housectl_domain::error::ValidationError;
use housectl_domain::motion::{MotionDrive, MotionProfile, Speed, StepCadence, Travel};
use housectl_domain::signal::Pin;
use serde::Deserialize;

/// Devices, topics, and publishing options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Prefix of every topic (e.g. `home`).
    pub base_topic: String,
    /// Controller name reported on the system topic.
    pub name: String,
    /// Retain error reports on `<topic>/error`.
    pub retain_errors: bool,
    pub light: LightConfig,
    pub door: DoorConfig,
    pub motor: MotorConfig,
}

/// Binary output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub name: String,
    pub pin: Pin,
}

/// Servo-driven door.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DoorConfig {
    pub name: String,
    pub pin: Pin,
    /// Angle (degrees) commanded by `ON`.
    pub open_angle: u16,
    /// Angle (degrees) commanded by `OFF`.
    pub closed_angle: u16,
    /// How long the drive signal is held before being cut.
    pub settle_ms: u64,
    pub pwm_frequency_hz: f64,
}

/// Motion device (fan or garage door).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub name: String,
    pub drive: DriveConfig,
    /// Speed (percent) applied by `ON`.
    pub default_speed: u16,
    /// Half-steps between closed and open; `0` makes the device continuous.
    pub travel_steps: u32,
    /// Speed (percent) used by `OPEN` / `CLOSE`.
    pub travel_speed: u16,
    /// Inter-step delay at 100 %.
    pub fastest_step_us: u64,
    /// Inter-step delay at 1 %.
    pub slowest_step_us: u64,
}

/// How the motion device is wired.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriveConfig {
    /// Four-phase stepper, lines `in1..in4`.
    Stepper { pins: [Pin; 4] },
    /// H-bridge with two direction lines and a PWM enable line.
    Dc {
        forward_pin: Pin,
        reverse_pin: Pin,
        enable_pin: Pin,
        #[serde(default = "default_dc_frequency")]
        pwm_frequency_hz: f64,
    },
}

fn default_dc_frequency() -> f64 {
    1000.0
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_topic: "home".to_string(),
            name: "housectl".to_string(),
            retain_errors: false,
            light: LightConfig::default(),
            door: DoorConfig::default(),
            motor: MotorConfig::default(),
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            name: "light".to_string(),
            pin: 17,
        }
    }
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            name: "door".to_string(),
            pin: 23,
            open_angle: 90,
            closed_angle: 0,
            settle_ms: 800,
            pwm_frequency_hz: 50.0,
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            name: "garage".to_string(),
            drive: DriveConfig::Stepper {
                pins: [27, 18, 22, 24],
            },
            default_speed: 75,
            travel_steps: 4096,
            travel_speed: 95,
            fastest_step_us: 1_000,
            slowest_step_us: 20_000,
        }
    }
}

/// Validated devices and the pins each one drives.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub light: LightWiring,
    pub door: DoorWiring,
    pub motor: MotorWiring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightWiring {
    pub device: Device,
    pub pin: Pin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoorWiring {
    pub device: Device,
    pub pin: Pin,
    pub settle: Duration,
    pub pwm_frequency_hz: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorWiring {
    pub device: Device,
    pub profile: MotionProfile,
    pub drive: DriveConfig,
}

impl DriveConfig {
    #[must_use]
    pub fn kind(&self) -> MotionDrive {
        match self {
            Self::Stepper { .. } => MotionDrive::Stepper,
            Self::Dc { .. } => MotionDrive::Dc,
        }
    }

    /// Every pin the drive claims.
    #[must_use]
    pub fn pins(&self) -> Vec<Pin> {
        match self {
            Self::Stepper { pins } => pins.to_vec(),
            Self::Dc {
                forward_pin,
                reverse_pin,
                enable_pin,
                ..
            } => vec![*forward_pin, *reverse_pin, *enable_pin],
        }
    }
}

impl Blueprint {
    /// Pin assignment per device, as reported on the system topic.
    #[must_use]
    pub fn gpio_pins(&self) -> BTreeMap<String, Vec<Pin>> {
        BTreeMap::from([
            (self.light.device.name.clone(), vec![self.light.pin]),
            (self.door.device.name.clone(), vec![self.door.pin]),
            (self.motor.device.name.clone(), self.motor.drive.pins()),
        ])
    }

    /// Devices in declaration order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        [&self.light.device, &self.door.device, &self.motor.device].into_iter()
    }
}

impl ControllerConfig {
    /// Validate the section and build the typed devices.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for empty or duplicate names, duplicate
    /// pins, out-of-range angles or speeds, or bounded travel on a DC drive.
    pub fn blueprint(&self) -> Result<Blueprint, ValidationError> {
        if self.base_topic.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let light = LightWiring {
            device: Device::new(&self.light.name, DeviceKind::Binary)?,
            pin: self.light.pin,
        };

        let door = DoorWiring {
            device: Device::new(
                &self.door.name,
                DeviceKind::Angle {
                    open: Angle::new(self.door.open_angle)?,
                    closed: Angle::new(self.door.closed_angle)?,
                },
            )?,
            pin: self.door.pin,
            settle: Duration::from_millis(self.door.settle_ms),
            pwm_frequency_hz: self.door.pwm_frequency_hz,
        };

        let profile = self.motor.profile()?;
        let motor = MotorWiring {
            device: Device::new(&self.motor.name, DeviceKind::Motion(profile))?,
            profile,
            drive: self.motor.drive.clone(),
        };

        let blueprint = Blueprint { light, door, motor };
        check_unique(&blueprint)?;
        Ok(blueprint)
    }
}

impl MotorConfig {
    fn profile(&self) -> Result<MotionProfile, ValidationError> {
        let drive = self.drive.kind();
        let travel = if self.travel_steps == 0 {
            None
        } else {
            if drive != MotionDrive::Stepper {
                return Err(ValidationError::BoundedTravelRequiresStepper(
                    self.name.clone(),
                ));
            }
            let speed = Speed::try_from(self.travel_speed)?;
            if speed.is_zero() {
                return Err(ValidationError::IdleTravelSpeed(self.name.clone()));
            }
            Some(Travel {
                steps: self.travel_steps,
                speed,
            })
        };
        let profile = MotionProfile {
            drive,
            default_speed: Speed::try_from(self.default_speed)?,
            travel,
            cadence: StepCadence {
                fastest: Duration::from_micros(self.fastest_step_us),
                slowest: Duration::from_micros(self.slowest_step_us.max(self.fastest_step_us)),
            },
        };
        if profile.worst_case_travel().is_none() {
            return Err(ValidationError::TravelTooLong(self.name.clone()));
        }
        Ok(profile)
    }
}

fn check_unique(blueprint: &Blueprint) -> Result<(), ValidationError> {
    let mut names = BTreeSet::new();
    for device in blueprint.devices() {
        if !names.insert(device.name.as_str()) {
            return Err(ValidationError::DuplicateName(device.name.clone()));
        }
    }

    let mut pins = BTreeSet::new();
    for pin in blueprint.gpio_pins().into_values().flatten() {
        if !pins.insert(pin) {
            return Err(ValidationError::DuplicatePin(pin));
        }
    }
    Ok(())
}
