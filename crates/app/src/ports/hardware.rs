//! Hardware port — the pin-level abstraction every actuator driver talks to.
//!
//! Implementations must make each call a single atomic operation on the pin
//! bank; the controller guarantees that a given pin only ever has one writer.

use std::sync::Arc;

use housectl_domain::error::HardwareError;
use housectl_domain::signal::{Level, Pin};

/// Digital output lines and PWM channels addressed by pin number.
///
/// Calls are synchronous: every operation is a register write or a short
/// syscall, never a wait.
pub trait Hardware: Send + Sync {
    /// Claim `pin` as an output and drive it to `initial`.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when the pin cannot be claimed.
    fn configure_output(&self, pin: Pin, initial: Level) -> Result<(), HardwareError>;

    /// Drive an output pin.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NotConfigured`] for an unclaimed pin.
    fn write(&self, pin: Pin, level: Level) -> Result<(), HardwareError>;

    /// Read back the level of an output pin.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NotConfigured`] for an unclaimed pin.
    fn read(&self, pin: Pin) -> Result<Level, HardwareError>;

    /// Start a PWM channel on an output pin.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when the pin is not an output.
    fn pwm_start(&self, pin: Pin, frequency_hz: f64, duty: f64) -> Result<(), HardwareError>;

    /// Change the duty cycle (percent) of a running PWM channel.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::PwmNotStarted`] when no channel runs on `pin`.
    fn pwm_set_duty(&self, pin: Pin, duty: f64) -> Result<(), HardwareError>;

    /// Stop the PWM channel on `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::PwmNotStarted`] when no channel runs on `pin`.
    fn pwm_stop(&self, pin: Pin) -> Result<(), HardwareError>;

    /// Drive every claimed pin low, stop every PWM channel, and give the pins back.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when the bank cannot be released cleanly.
    fn release_all(&self) -> Result<(), HardwareError>;
}

impl<T: Hardware + ?Sized> Hardware for Arc<T> {
    fn configure_output(&self, pin: Pin, initial: Level) -> Result<(), HardwareError> {
        (**self).configure_output(pin, initial)
    }

    fn write(&self, pin: Pin, level: Level) -> Result<(), HardwareError> {
        (**self).write(pin, level)
    }

    fn read(&self, pin: Pin) -> Result<Level, HardwareError> {
        (**self).read(pin)
    }

    fn pwm_start(&self, pin: Pin, frequency_hz: f64, duty: f64) -> Result<(), HardwareError> {
        (**self).pwm_start(pin, frequency_hz, duty)
    }

    fn pwm_set_duty(&self, pin: Pin, duty: f64) -> Result<(), HardwareError> {
        (**self).pwm_set_duty(pin, duty)
    }

    fn pwm_stop(&self, pin: Pin) -> Result<(), HardwareError> {
        (**self).pwm_stop(pin)
    }

    fn release_all(&self) -> Result<(), HardwareError> {
        (**self).release_all()
    }
}
