//! Command grammar — parses raw payloads into closed command values.
//!
//! Payloads are trimmed and compared case-insensitively. Error values always
//! carry the trimmed payload exactly as received so the published error can
//! cite it.

use crate::device::DeviceKind;
use crate::error::ValidationError;
use crate::motion::Speed;

const SWITCH_VOCABULARY: &str = "ON or OFF";
const MOTION_VOCABULARY: &str = "ON, OFF, OPEN, CLOSE, FORWARD, REVERSE, STOP or SPEED:<0-100>";

/// Command addressed to a motion device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCommand {
    On,
    Off,
    Open,
    Close,
    Forward,
    Reverse,
    /// Emergency stop; preempts an in-flight travel.
    Stop,
    Speed(Speed),
}

impl MotionCommand {
    /// Parse a motion payload such as `open` or `SPEED: 40`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCommand`] for an unknown token,
    /// [`ValidationError::MalformedSpeed`] for a non-numeric speed and
    /// [`ValidationError::SpeedOutOfRange`] for a speed outside `0..=100`.
    pub fn parse(payload: &str) -> Result<Self, ValidationError> {
        let trimmed = payload.trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some((token, argument)) = upper.split_once(':') {
            if token.trim() != "SPEED" {
                return Err(invalid(trimmed, MOTION_VOCABULARY));
            }
            let value: i64 =
                argument
                    .trim()
                    .parse()
                    .map_err(|_| ValidationError::MalformedSpeed {
                        payload: trimmed.to_string(),
                    })?;
            return u8::try_from(value)
                .ok()
                .and_then(|percent| Speed::new(percent).ok())
                .map(Self::Speed)
                .ok_or_else(|| ValidationError::SpeedOutOfRange {
                    payload: trimmed.to_string(),
                    value,
                });
        }

        match upper.as_str() {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            "OPEN" => Ok(Self::Open),
            "CLOSE" => Ok(Self::Close),
            "FORWARD" => Ok(Self::Forward),
            "REVERSE" => Ok(Self::Reverse),
            "STOP" => Ok(Self::Stop),
            _ => Err(invalid(trimmed, MOTION_VOCABULARY)),
        }
    }

    /// Upper-case command token, as used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Forward => "FORWARD",
            Self::Reverse => "REVERSE",
            Self::Stop => "STOP",
            Self::Speed(_) => "SPEED",
        }
    }
}

/// A validated command for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Light(bool),
    Door(bool),
    Motion(MotionCommand),
}

impl DeviceCommand {
    /// Parse `payload` with the grammar of a device of the given kind.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] citing the payload when it is not part
    /// of the grammar.
    pub fn parse(kind: &DeviceKind, payload: &str) -> Result<Self, ValidationError> {
        match kind {
            DeviceKind::Binary => parse_switch(payload).map(Self::Light),
            DeviceKind::Angle { .. } => parse_switch(payload).map(Self::Door),
            DeviceKind::Motion(_) => MotionCommand::parse(payload).map(Self::Motion),
        }
    }

    /// Upper-case command token, as used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Light(true) | Self::Door(true) => "ON",
            Self::Light(false) | Self::Door(false) => "OFF",
            Self::Motion(command) => command.name(),
        }
    }
}

fn parse_switch(payload: &str) -> Result<bool, ValidationError> {
    let trimmed = payload.trim();
    if trimmed.eq_ignore_ascii_case("ON") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("OFF") {
        Ok(false)
    } else {
        Err(invalid(trimmed, SWITCH_VOCABULARY))
    }
}

fn invalid(payload: &str, expected: &'static str) -> ValidationError {
    ValidationError::InvalidCommand {
        payload: payload.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Angle;
    use crate::motion::MotionProfile;

    fn door_kind() -> DeviceKind {
        DeviceKind::Angle {
            open: Angle::new(90).unwrap(),
            closed: Angle::MIN,
        }
    }

    #[test]
    fn should_accept_switch_tokens_case_insensitively() {
        for (payload, expected) in [("ON", true), (" on ", true), ("Off", false), ("off\n", false)] {
            assert_eq!(
                DeviceCommand::parse(&DeviceKind::Binary, payload),
                Ok(DeviceCommand::Light(expected))
            );
        }
    }

    #[test]
    fn should_reject_unknown_switch_payload_citing_it() {
        for payload in ["", "toggle", "1", "ONN", "OPEN"] {
            let err = DeviceCommand::parse(&DeviceKind::Binary, payload).unwrap_err();
            assert_eq!(
                err,
                ValidationError::InvalidCommand {
                    payload: payload.trim().to_string(),
                    expected: "ON or OFF",
                }
            );
        }
    }

    #[test]
    fn should_parse_door_switch() {
        assert_eq!(
            DeviceCommand::parse(&door_kind(), "on"),
            Ok(DeviceCommand::Door(true))
        );
    }

    #[test]
    fn should_parse_motion_tokens() {
        let kind = DeviceKind::Motion(MotionProfile::garage(10));
        assert_eq!(
            DeviceCommand::parse(&kind, "open"),
            Ok(DeviceCommand::Motion(MotionCommand::Open))
        );
        assert_eq!(MotionCommand::parse(" Close "), Ok(MotionCommand::Close));
        assert_eq!(MotionCommand::parse("stop"), Ok(MotionCommand::Stop));
        assert_eq!(MotionCommand::parse("REVERSE"), Ok(MotionCommand::Reverse));
    }

    #[test]
    fn should_parse_speed_in_range() {
        for percent in [0_u8, 1, 50, 100] {
            let payload = format!("speed:{percent}");
            assert_eq!(
                MotionCommand::parse(&payload),
                Ok(MotionCommand::Speed(Speed::new(percent).unwrap()))
            );
        }
        assert_eq!(
            MotionCommand::parse("SPEED: 42 "),
            Ok(MotionCommand::Speed(Speed::new(42).unwrap()))
        );
    }

    #[test]
    fn should_reject_out_of_range_speed_citing_payload() {
        let err = MotionCommand::parse("SPEED:150").unwrap_err();
        assert_eq!(
            err,
            ValidationError::SpeedOutOfRange {
                payload: "SPEED:150".to_string(),
                value: 150
            }
        );
        assert!(err.to_string().contains("150"));

        let err = MotionCommand::parse("SPEED:-5").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::SpeedOutOfRange { value: -5, .. }
        ));
    }

    #[test]
    fn should_reject_non_numeric_speed_citing_payload() {
        for payload in ["SPEED:fast", "SPEED:", "speed:4.5", "SPEED:99999999999999999999"] {
            let err = MotionCommand::parse(payload).unwrap_err();
            assert_eq!(
                err,
                ValidationError::MalformedSpeed {
                    payload: payload.to_string()
                }
            );
        }
    }

    #[test]
    fn should_reject_unknown_parameterised_command() {
        let err = MotionCommand::parse("ANGLE:40").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidCommand { ref payload, .. } if payload == "ANGLE:40"
        ));
    }
}
