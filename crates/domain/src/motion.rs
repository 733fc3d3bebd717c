//! Motor model — speed, direction, state record, and actuation planning.
//!
//! [`MotionPlan::for_command`] turns a parsed [`MotionCommand`] and the
//! current [`MotorState`] into the single actuation the motor worker has to
//! perform, or [`MotionPlan::Unchanged`] when the device is already there.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::MotionCommand;
use crate::error::ValidationError;

/// Speed as a percentage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u8")]
pub struct Speed(u8);

impl Speed {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSpeed`] when `percent > 100`.
    pub fn new(percent: u8) -> Result<Self, ValidationError> {
        if percent > Self::FULL.0 {
            return Err(ValidationError::InvalidSpeed(u16::from(percent)));
        }
        Ok(Self(percent))
    }

    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u16> for Speed {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| ValidationError::InvalidSpeed(value))
            .and_then(Self::new)
    }
}

impl From<Speed> for u8 {
    fn from(speed: Speed) -> Self {
        speed.0
    }
}

/// Rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
    #[default]
    Stop,
}

impl Direction {
    /// Position delta of a single step in this direction.
    #[must_use]
    pub fn step_delta(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
            Self::Stop => 0,
        }
    }
}

/// Last-known state of a motion device.
///
/// Constructors keep `running == (speed > 0)` and
/// `direction == Stop ⇒ speed == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotorState {
    running: bool,
    direction: Direction,
    speed: u8,
    position: i64,
}

impl MotorState {
    /// A motor at rest at `position`.
    #[must_use]
    pub fn stopped(position: i64) -> Self {
        Self {
            running: false,
            direction: Direction::Stop,
            speed: 0,
            position,
        }
    }

    /// A motor turning in `direction` at `speed`; collapses to
    /// [`stopped`](Self::stopped) for a zero speed or [`Direction::Stop`].
    #[must_use]
    pub fn moving(direction: Direction, speed: Speed, position: i64) -> Self {
        if speed.is_zero() || direction == Direction::Stop {
            return Self::stopped(position);
        }
        Self {
            running: true,
            direction,
            speed: speed.percent(),
            position,
        }
    }

    #[must_use]
    pub fn with_position(self, position: i64) -> Self {
        Self { position, ..self }
    }

    #[must_use]
    pub fn running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn speed(&self) -> Speed {
        Speed(self.speed)
    }

    #[must_use]
    pub fn position(&self) -> i64 {
        self.position
    }
}

impl Default for MotorState {
    fn default() -> Self {
        Self::stopped(0)
    }
}

/// How the motor is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionDrive {
    /// Two direction lines plus a PWM enable line (L293D-style H-bridge).
    Dc,
    /// Four-phase stepper driven with a half-step table (ULN2003-style).
    Stepper,
}

impl MotionDrive {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Dc => "dc",
            Self::Stepper => "stepper",
        }
    }
}

/// Travel budget of a bounded-travel mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Travel {
    /// Half-steps between fully closed and fully open.
    pub steps: u32,
    /// Speed used for `OPEN` / `CLOSE` runs.
    pub speed: Speed,
}

/// Mapping from speed percentage to inter-step delay for a stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCadence {
    /// Delay at 100 %.
    pub fastest: Duration,
    /// Delay at 1 %.
    pub slowest: Duration,
}

impl Default for StepCadence {
    fn default() -> Self {
        Self {
            fastest: Duration::from_millis(1),
            slowest: Duration::from_millis(20),
        }
    }
}

impl StepCadence {
    /// Inter-step delay for `speed`; `None` at 0 % (idle).
    ///
    /// Linear between `fastest` at 100 % and `slowest` at 1 %.
    #[must_use]
    pub fn delay_for(&self, speed: Speed) -> Option<Duration> {
        if speed.is_zero() {
            return None;
        }
        let span = self.slowest.saturating_sub(self.fastest);
        let slowdown = u32::from(Speed::FULL.0 - speed.0);
        Some(self.fastest + span * slowdown / 99)
    }
}

/// Everything the controller needs to know to drive a motion device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    pub drive: MotionDrive,
    /// Speed applied by `ON` (and by `FORWARD`/`REVERSE` from rest).
    pub default_speed: Speed,
    /// Present for bounded-travel mechanisms (garage door).
    pub travel: Option<Travel>,
    pub cadence: StepCadence,
}

impl MotionProfile {
    /// Bounded-travel stepper (garage door) with `steps` half-steps of travel.
    #[must_use]
    pub fn garage(steps: u32) -> Self {
        Self {
            drive: MotionDrive::Stepper,
            default_speed: Speed(75),
            travel: Some(Travel {
                steps,
                speed: Speed(95),
            }),
            cadence: StepCadence::default(),
        }
    }

    /// Continuous DC fan.
    #[must_use]
    pub fn fan() -> Self {
        Self {
            drive: MotionDrive::Dc,
            default_speed: Speed(75),
            travel: None,
            cadence: StepCadence::default(),
        }
    }

    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.travel.is_some()
    }

    /// Longest time a single `OPEN`/`CLOSE` run can take, or `None` when it
    /// does not fit in a [`Duration`].
    ///
    /// A travel speed of 0 is timed at the slowest step delay, as the motor
    /// worker runs it.
    #[must_use]
    pub fn worst_case_travel(&self) -> Option<Duration> {
        let Some(travel) = self.travel else {
            return Some(Duration::ZERO);
        };
        self.cadence
            .delay_for(travel.speed)
            .unwrap_or(self.cadence.slowest)
            .checked_mul(travel.steps)
    }
}

/// The actuation a motion command resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPlan {
    /// Device already in the requested state; do not drive the hardware.
    Unchanged,
    /// Turn continuously in `direction` at `speed`.
    Run { direction: Direction, speed: Speed },
    /// Ordinary stop.
    Stop,
    /// Run exactly `steps` half-steps in `direction`, then stop.
    Travel { direction: Direction, steps: u32 },
    /// Emergency stop: always de-asserts every line.
    Halt,
}

impl MotionPlan {
    /// Resolve `command` against the current state of `device`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedCommand`] when the command is not
    /// part of the device's capability subset.
    pub fn for_command(
        device: &str,
        command: MotionCommand,
        current: &MotorState,
        profile: &MotionProfile,
    ) -> Result<Self, ValidationError> {
        let unsupported = || ValidationError::UnsupportedCommand {
            command: command.name(),
            device: device.to_string(),
        };

        match (command, profile.travel) {
            (MotionCommand::Stop, _) => Ok(Self::Halt),
            (MotionCommand::Off | MotionCommand::Speed(Speed::ZERO), _) => {
                Ok(Self::stop_unless_idle(current))
            }
            (MotionCommand::Open, Some(travel)) => {
                let remaining = i64::from(travel.steps) - current.position();
                Ok(Self::travel_or_unchanged(Direction::Forward, remaining))
            }
            (MotionCommand::Close, Some(_)) => Ok(Self::travel_or_unchanged(
                Direction::Reverse,
                current.position(),
            )),
            (MotionCommand::On, None) => Ok(Self::run_unless_current(
                current,
                Direction::Forward,
                profile.default_speed,
            )),
            (MotionCommand::Speed(speed), None) => {
                let direction = if current.running() {
                    current.direction()
                } else {
                    Direction::Forward
                };
                Ok(Self::run_unless_current(current, direction, speed))
            }
            (MotionCommand::Forward | MotionCommand::Reverse, None) => {
                let direction = if command == MotionCommand::Forward {
                    Direction::Forward
                } else {
                    Direction::Reverse
                };
                let speed = if current.running() {
                    current.speed()
                } else {
                    profile.default_speed
                };
                Ok(Self::run_unless_current(current, direction, speed))
            }
            (
                MotionCommand::On
                | MotionCommand::Speed(_)
                | MotionCommand::Forward
                | MotionCommand::Reverse,
                Some(_),
            )
            | (MotionCommand::Open | MotionCommand::Close, None) => Err(unsupported()),
        }
    }

    fn stop_unless_idle(current: &MotorState) -> Self {
        if current.running() {
            Self::Stop
        } else {
            Self::Unchanged
        }
    }

    fn travel_or_unchanged(direction: Direction, steps: i64) -> Self {
        match u32::try_from(steps) {
            Ok(steps) if steps > 0 => Self::Travel { direction, steps },
            _ => Self::Unchanged,
        }
    }

    fn run_unless_current(current: &MotorState, direction: Direction, speed: Speed) -> Self {
        if current.running() && current.direction() == direction && current.speed() == speed {
            Self::Unchanged
        } else {
            Self::Run { direction, speed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed(percent: u8) -> Speed {
        Speed::new(percent).unwrap()
    }

    #[test]
    fn should_keep_running_consistent_with_speed() {
        let state = MotorState::moving(Direction::Forward, Speed::ZERO, 12);
        assert!(!state.running());
        assert_eq!(state.direction(), Direction::Stop);
        assert_eq!(state.position(), 12);

        let state = MotorState::moving(Direction::Stop, speed(50), 0);
        assert!(!state.running());
        assert_eq!(state.speed(), Speed::ZERO);

        let state = MotorState::moving(Direction::Reverse, speed(50), 0);
        assert!(state.running());
        assert_eq!(state.speed().percent(), 50);
    }

    #[test]
    fn should_reject_speed_above_100() {
        assert_eq!(Speed::new(101), Err(ValidationError::InvalidSpeed(101)));
        assert_eq!(Speed::try_from(300_u16), Err(ValidationError::InvalidSpeed(300)));
    }

    #[test]
    fn should_idle_at_zero_speed() {
        assert_eq!(StepCadence::default().delay_for(Speed::ZERO), None);
    }

    #[test]
    fn should_widen_step_delay_as_speed_decreases() {
        let cadence = StepCadence::default();
        assert_eq!(cadence.delay_for(Speed::FULL), Some(Duration::from_millis(1)));
        assert_eq!(cadence.delay_for(speed(1)), Some(Duration::from_millis(20)));
        let fast = cadence.delay_for(speed(80)).unwrap();
        let slow = cadence.delay_for(speed(20)).unwrap();
        assert!(fast < slow);
    }

    #[test]
    fn should_bound_worst_case_travel_by_steps_and_delay() {
        let profile = MotionProfile::garage(1000);
        let delay = profile.cadence.delay_for(speed(95)).unwrap();
        assert_eq!(profile.worst_case_travel(), Some(delay * 1000));
        assert_eq!(MotionProfile::fan().worst_case_travel(), Some(Duration::ZERO));
    }

    #[test]
    fn should_time_idle_travel_speed_at_slowest_delay() {
        let mut profile = MotionProfile::garage(10);
        profile.travel = Some(Travel {
            steps: 10,
            speed: Speed::ZERO,
        });
        assert_eq!(profile.worst_case_travel(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn should_report_unschedulable_travel_instead_of_overflowing() {
        let mut profile = MotionProfile::garage(u32::MAX);
        profile.cadence = StepCadence {
            fastest: Duration::MAX,
            slowest: Duration::MAX,
        };
        assert_eq!(profile.worst_case_travel(), None);
    }

    #[test]
    fn should_plan_full_travel_when_opening_closed_garage() {
        let plan = MotionPlan::for_command(
            "garage",
            MotionCommand::Open,
            &MotorState::stopped(0),
            &MotionProfile::garage(100),
        );
        assert_eq!(
            plan,
            Ok(MotionPlan::Travel {
                direction: Direction::Forward,
                steps: 100
            })
        );
    }

    #[test]
    fn should_resume_open_from_partial_position() {
        let plan = MotionPlan::for_command(
            "garage",
            MotionCommand::Open,
            &MotorState::stopped(30),
            &MotionProfile::garage(100),
        );
        assert_eq!(
            plan,
            Ok(MotionPlan::Travel {
                direction: Direction::Forward,
                steps: 70
            })
        );
    }

    #[test]
    fn should_leave_open_garage_unchanged() {
        let plan = MotionPlan::for_command(
            "garage",
            MotionCommand::Open,
            &MotorState::stopped(100),
            &MotionProfile::garage(100),
        );
        assert_eq!(plan, Ok(MotionPlan::Unchanged));
    }

    #[test]
    fn should_close_back_to_zero() {
        let plan = MotionPlan::for_command(
            "garage",
            MotionCommand::Close,
            &MotorState::stopped(100),
            &MotionProfile::garage(100),
        );
        assert_eq!(
            plan,
            Ok(MotionPlan::Travel {
                direction: Direction::Reverse,
                steps: 100
            })
        );
    }

    #[test]
    fn should_reject_speed_on_bounded_device() {
        let plan = MotionPlan::for_command(
            "garage",
            MotionCommand::Speed(speed(40)),
            &MotorState::stopped(0),
            &MotionProfile::garage(100),
        );
        assert_eq!(
            plan,
            Err(ValidationError::UnsupportedCommand {
                command: "SPEED",
                device: "garage".to_string()
            })
        );
    }

    #[test]
    fn should_reject_open_on_continuous_device() {
        let plan = MotionPlan::for_command(
            "fan",
            MotionCommand::Open,
            &MotorState::stopped(0),
            &MotionProfile::fan(),
        );
        assert!(matches!(
            plan,
            Err(ValidationError::UnsupportedCommand { command: "OPEN", .. })
        ));
    }

    #[test]
    fn should_start_forward_at_default_speed_on() {
        let plan = MotionPlan::for_command(
            "fan",
            MotionCommand::On,
            &MotorState::stopped(0),
            &MotionProfile::fan(),
        );
        assert_eq!(
            plan,
            Ok(MotionPlan::Run {
                direction: Direction::Forward,
                speed: speed(75)
            })
        );
    }

    #[test]
    fn should_keep_direction_when_changing_speed() {
        let current = MotorState::moving(Direction::Reverse, speed(30), 0);
        let plan = MotionPlan::for_command(
            "fan",
            MotionCommand::Speed(speed(60)),
            &current,
            &MotionProfile::fan(),
        );
        assert_eq!(
            plan,
            Ok(MotionPlan::Run {
                direction: Direction::Reverse,
                speed: speed(60)
            })
        );
    }

    #[test]
    fn should_treat_zero_speed_as_stop() {
        let current = MotorState::moving(Direction::Forward, speed(30), 0);
        let plan = MotionPlan::for_command(
            "fan",
            MotionCommand::Speed(Speed::ZERO),
            &current,
            &MotionProfile::fan(),
        );
        assert_eq!(plan, Ok(MotionPlan::Stop));
    }

    #[test]
    fn should_leave_same_speed_unchanged() {
        let current = MotorState::moving(Direction::Forward, speed(30), 0);
        let plan = MotionPlan::for_command(
            "fan",
            MotionCommand::Speed(speed(30)),
            &current,
            &MotionProfile::fan(),
        );
        assert_eq!(plan, Ok(MotionPlan::Unchanged));
    }

    #[test]
    fn should_reverse_at_running_speed() {
        let current = MotorState::moving(Direction::Forward, speed(45), 0);
        let plan = MotionPlan::for_command(
            "fan",
            MotionCommand::Reverse,
            &current,
            &MotionProfile::fan(),
        );
        assert_eq!(
            plan,
            Ok(MotionPlan::Run {
                direction: Direction::Reverse,
                speed: speed(45)
            })
        );
    }

    #[test]
    fn should_leave_idle_motor_unchanged_on_off() {
        let plan = MotionPlan::for_command(
            "fan",
            MotionCommand::Off,
            &MotorState::stopped(0),
            &MotionProfile::fan(),
        );
        assert_eq!(plan, Ok(MotionPlan::Unchanged));
    }

    #[test]
    fn should_always_halt_on_stop() {
        for profile in [MotionProfile::fan(), MotionProfile::garage(10)] {
            let plan = MotionPlan::for_command(
                "motor",
                MotionCommand::Stop,
                &MotorState::stopped(0),
                &profile,
            );
            assert_eq!(plan, Ok(MotionPlan::Halt));
        }
    }
}
