//! On/off output (light).

use std::sync::Arc;

use housectl_domain::error::HardwareError;
use housectl_domain::signal::{Level, Pin};

use crate::ports::Hardware;

/// A single digital output line.
#[derive(Debug)]
pub struct BinaryOutput<H> {
    pin: Pin,
    hardware: Arc<H>,
}

impl<H: Hardware> BinaryOutput<H> {
    /// Claim `pin` and drive it low.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] when the pin cannot be claimed.
    pub fn configure(pin: Pin, hardware: Arc<H>) -> Result<Self, HardwareError> {
        hardware.configure_output(pin, Level::Low)?;
        Ok(Self { pin, hardware })
    }

    /// # Errors
    ///
    /// Returns a [`HardwareError`] when the write fails.
    pub fn set(&self, on: bool) -> Result<(), HardwareError> {
        tracing::debug!(pin = self.pin, on, "binary output");
        self.hardware.write(self.pin, Level::from_bool(on))
    }

    #[must_use]
    pub fn pin(&self) -> Pin {
        self.pin
    }
}
