//! Angle-seeking servo (door).
//!
//! The drive signal is only held for the settle time; afterwards the duty
//! cycle is forced back to 0 so the servo does not jitter or heat up while
//! idle. That last step runs even when driving the angle failed.

use std::sync::Arc;
use std::time::Duration;

use housectl_domain::device::Angle;
use housectl_domain::error::HardwareError;
use housectl_domain::signal::{Level, Pin};

use crate::ports::Hardware;

#[derive(Debug)]
pub struct Servo<H> {
    pin: Pin,
    settle: Duration,
    hardware: Arc<H>,
}

impl<H: Hardware> Servo<H> {
    /// Claim `pin` and start its PWM channel with no drive signal.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when the pin or PWM channel cannot be set up.
    pub fn configure(
        pin: Pin,
        frequency_hz: f64,
        settle: Duration,
        hardware: Arc<H>,
    ) -> Result<Self, HardwareError> {
        hardware.configure_output(pin, Level::Low)?;
        hardware.pwm_start(pin, frequency_hz, 0.0)?;
        Ok(Self {
            pin,
            settle,
            hardware,
        })
    }

    /// Drive to `angle`, wait for the settle time, then cut the signal.
    ///
    /// # Errors
    ///
    /// Returns the first [`HardwareError`] hit while driving or releasing.
    pub async fn move_to(&self, angle: Angle) -> Result<(), HardwareError> {
        let duty = angle.duty_cycle();
        tracing::debug!(pin = self.pin, angle = angle.degrees(), duty, "servo move");
        let driven = self.hardware.pwm_set_duty(self.pin, duty);
        if driven.is_ok() {
            tokio::time::sleep(self.settle).await;
        }
        let released = self.release_signal();
        driven.and(released)
    }

    /// Set the duty cycle to 0.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when the PWM channel rejects the change.
    pub fn release_signal(&self) -> Result<(), HardwareError> {
        self.hardware.pwm_set_duty(self.pin, 0.0)
    }

    /// Cut the signal and stop the PWM channel.
    ///
    /// # Errors
    ///
    /// Returns the first [`HardwareError`] hit.
    pub fn stop(&self) -> Result<(), HardwareError> {
        let released = self.release_signal();
        let stopped = self.hardware.pwm_stop(self.pin);
        released.and(stopped)
    }

    #[must_use]
    pub fn pin(&self) -> Pin {
        self.pin
    }
}
