//! Four-phase stepper driven with a half-step table.

use std::sync::Arc;

use housectl_domain::error::HardwareError;
use housectl_domain::motion::Direction;
use housectl_domain::signal::{Level, Pin};
use housectl_domain::status::LineLevels;

use crate::ports::Hardware;

/// Line levels for `in1..in4`, one row per half-step.
pub const HALF_STEP_SEQUENCE: [[bool; 4]; 8] = [
    [true, false, false, true],
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
];

#[derive(Debug)]
pub struct Stepper<H> {
    pins: [Pin; 4],
    /// Row of [`HALF_STEP_SEQUENCE`] applied last.
    phase: Option<usize>,
    hardware: Arc<H>,
}

impl<H: Hardware> Stepper<H> {
    /// Claim the four lines, all low.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when a line cannot be claimed.
    pub fn configure(pins: [Pin; 4], hardware: Arc<H>) -> Result<Self, HardwareError> {
        for pin in pins {
            hardware.configure_output(pin, Level::Low)?;
        }
        Ok(Self {
            pins,
            phase: None,
            hardware,
        })
    }

    /// Apply the next (forward) or previous (reverse) half-step pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when a line cannot be written.
    pub fn step(&mut self, direction: Direction) -> Result<(), HardwareError> {
        let len = HALF_STEP_SEQUENCE.len();
        let next = match (direction, self.phase) {
            (Direction::Stop, _) => return Ok(()),
            (Direction::Forward, None) => 0,
            (Direction::Reverse, None) => len - 1,
            (Direction::Forward, Some(phase)) => (phase + 1) % len,
            (Direction::Reverse, Some(phase)) => (phase + len - 1) % len,
        };
        for (pin, high) in self.pins.iter().zip(HALF_STEP_SEQUENCE[next]) {
            self.hardware.write(*pin, Level::from_bool(high))?;
        }
        self.phase = Some(next);
        Ok(())
    }

    /// Lower all four lines. Every line is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`HardwareError`] hit.
    pub fn deassert(&mut self) -> Result<(), HardwareError> {
        self.pins
            .iter()
            .map(|pin| self.hardware.write(*pin, Level::Low))
            .fold(Ok(()), Result::and)
    }

    /// # Errors
    ///
    /// Returns a [`HardwareError`] when a line cannot be read.
    pub fn lines(&self) -> Result<LineLevels, HardwareError> {
        let lines = self
            .pins
            .iter()
            .enumerate()
            .map(|(idx, pin)| Ok((format!("in{}", idx + 1), self.hardware.read(*pin)?)))
            .collect::<Result<_, HardwareError>>()?;
        Ok(LineLevels { lines, duty: None })
    }

    #[must_use]
    pub fn pins(&self) -> [Pin; 4] {
        self.pins
    }
}
