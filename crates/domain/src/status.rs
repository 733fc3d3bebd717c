//! Outbound status records — aggregate snapshot, system info, last will,
//! motor diagnostics, and error reports.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::motion::{Direction, MotorState};
use crate::signal::{Level, Pin};
use crate::state::DeviceState;
use crate::time::{Timestamp, now};

/// Whether the controller is serving commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

/// Aggregate snapshot published on `<base>/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub timestamp: Timestamp,
    pub devices: BTreeMap<String, DeviceState>,
    pub controller: Presence,
}

/// Controller description published on `<base>/system`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub status: Presence,
    pub timestamp: Timestamp,
    pub message: String,
    pub version: String,
    pub controller: String,
    pub motor_driver: String,
    pub gpio_pins: BTreeMap<String, Vec<Pin>>,
}

/// Payload the broker publishes on `<base>/system` if the controller vanishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastWill {
    pub status: Presence,
    pub reason: &'static str,
    pub timestamp: Timestamp,
    /// Motion devices are treated as emergency-stopped once the controller
    /// is gone.
    pub emergency_stopped: bool,
}

impl Default for LastWill {
    fn default() -> Self {
        Self {
            status: Presence::Offline,
            reason: "unexpected_disconnect",
            timestamp: now(),
            emergency_stopped: true,
        }
    }
}

/// Read-back of a motor's control lines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineLevels {
    /// `(label, level)` per line, e.g. `("in1", High)`.
    pub lines: Vec<(String, Level)>,
    /// Enable duty cycle (percent) for PWM-driven motors.
    pub duty: Option<f64>,
}

impl LineLevels {
    #[must_use]
    pub fn all_low(&self) -> bool {
        self.lines.iter().all(|(_, level)| !level.is_high())
    }
}

/// Diagnostics published on `<base>/<device>/motor_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotorDiagnostics {
    pub running: bool,
    pub direction: Direction,
    pub speed: u8,
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_percent: Option<u8>,
    pub lines: BTreeMap<String, u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duty: Option<f64>,
}

impl MotorDiagnostics {
    /// Combine a motor state with its line read-back.
    ///
    /// `travel_steps` is set for bounded-travel devices and yields
    /// `open_percent`.
    #[must_use]
    pub fn new(state: &MotorState, lines: &LineLevels, travel_steps: Option<u32>) -> Self {
        let open_percent = travel_steps.filter(|steps| *steps > 0).map(|steps| {
            let steps = i64::from(steps);
            let percent = state.position().clamp(0, steps) * 100 / steps;
            u8::try_from(percent).unwrap_or(100)
        });
        Self {
            running: state.running(),
            direction: state.direction(),
            speed: state.speed().percent(),
            position: state.position(),
            open_percent,
            lines: lines
                .lines
                .iter()
                .map(|(label, level)| (label.clone(), level.as_bit()))
                .collect(),
            duty: lines.duty,
        }
    }
}

/// Error record published on `<topic>/error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub timestamp: Timestamp,
    pub topic: String,
    pub motor_status: Option<MotorDiagnostics>,
}
