//! DC motor behind an H-bridge: two direction lines and a PWM enable line.
//!
//! The line being lowered is always written before the line being raised,
//! so both direction lines are never high at the same time.

use std::sync::Arc;

use housectl_domain::error::HardwareError;
use housectl_domain::motion::{Direction, Speed};
use housectl_domain::signal::{Level, Pin};
use housectl_domain::status::LineLevels;

use crate::ports::Hardware;

#[derive(Debug)]
pub struct DcMotor<H> {
    forward: Pin,
    reverse: Pin,
    enable: Pin,
    duty: f64,
    hardware: Arc<H>,
}

impl<H: Hardware> DcMotor<H> {
    /// Claim the three lines, direction lines low and enable at 0 % duty.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when a line or the PWM channel cannot be set up.
    pub fn configure(
        forward: Pin,
        reverse: Pin,
        enable: Pin,
        frequency_hz: f64,
        hardware: Arc<H>,
    ) -> Result<Self, HardwareError> {
        hardware.configure_output(forward, Level::Low)?;
        hardware.configure_output(reverse, Level::Low)?;
        hardware.configure_output(enable, Level::Low)?;
        hardware.pwm_start(enable, frequency_hz, 0.0)?;
        Ok(Self {
            forward,
            reverse,
            enable,
            duty: 0.0,
            hardware,
        })
    }

    /// Turn in `direction` with `speed` as the enable duty cycle.
    ///
    /// # Errors
    ///
    /// Returns the first [`HardwareError`] hit.
    pub fn apply(&mut self, direction: Direction, speed: Speed) -> Result<(), HardwareError> {
        let (lower, raise) = match direction {
            Direction::Stop => return self.stop(),
            Direction::Forward => (self.reverse, self.forward),
            Direction::Reverse => (self.forward, self.reverse),
        };
        self.hardware.write(lower, Level::Low)?;
        self.hardware.write(raise, Level::High)?;
        self.set_duty(f64::from(speed.percent()))
    }

    /// Cut the enable duty and lower both direction lines.
    ///
    /// Every step is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`HardwareError`] hit.
    pub fn stop(&mut self) -> Result<(), HardwareError> {
        let duty = self.set_duty(0.0);
        let forward = self.hardware.write(self.forward, Level::Low);
        let reverse = self.hardware.write(self.reverse, Level::Low);
        duty.and(forward).and(reverse)
    }

    /// Read back both direction lines and the current duty.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when a line cannot be read.
    pub fn lines(&self) -> Result<LineLevels, HardwareError> {
        Ok(LineLevels {
            lines: vec![
                ("in1".to_string(), self.hardware.read(self.forward)?),
                ("in2".to_string(), self.hardware.read(self.reverse)?),
            ],
            duty: Some(self.duty),
        })
    }

    /// Direction lines; the enable line is covered by its PWM channel.
    #[must_use]
    pub fn direction_pins(&self) -> [Pin; 2] {
        [self.forward, self.reverse]
    }

    fn set_duty(&mut self, duty: f64) -> Result<(), HardwareError> {
        self.hardware.pwm_set_duty(self.enable, duty)?;
        self.duty = duty;
        Ok(())
    }
}
