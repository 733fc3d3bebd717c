use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use housectl_app::ports::Hardware;
use housectl_domain::error::HardwareError;
use housectl_domain::signal::{Level, Pin};

/// State of a running PWM channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmChannel {
    pub frequency_hz: f64,
    pub duty: f64,
}

#[derive(Debug, Default)]
struct Bank {
    levels: BTreeMap<Pin, Level>,
    pwm: BTreeMap<Pin, PwmChannel>,
    faults: BTreeSet<Pin>,
    history: Vec<(Pin, Level)>,
    released: bool,
}

impl Bank {
    fn ensure_usable(&self, pin: Pin) -> Result<(), HardwareError> {
        if self.released {
            return Err(HardwareError::Released);
        }
        if self.faults.contains(&pin) {
            return Err(HardwareError::Io {
                pin,
                source: std::io::Error::other("injected fault"),
            });
        }
        Ok(())
    }

    fn ensure_output(&self, pin: Pin) -> Result<(), HardwareError> {
        self.ensure_usable(pin)?;
        if self.levels.contains_key(&pin) {
            Ok(())
        } else {
            Err(HardwareError::NotConfigured(pin))
        }
    }
}

/// In-memory pin bank.
#[derive(Debug, Default)]
pub struct VirtualHardware {
    bank: Mutex<Bank>,
}

impl VirtualHardware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bank(&self) -> MutexGuard<'_, Bank> {
        self.bank.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level of `pin`; unclaimed pins read low.
    #[must_use]
    pub fn level(&self, pin: Pin) -> Level {
        self.bank().levels.get(&pin).copied().unwrap_or_default()
    }

    /// Running PWM channel on `pin`, if any.
    #[must_use]
    pub fn pwm(&self, pin: Pin) -> Option<PwmChannel> {
        self.bank().pwm.get(&pin).copied()
    }

    /// Every write since start, in order.
    #[must_use]
    pub fn history(&self) -> Vec<(Pin, Level)> {
        self.bank().history.clone()
    }

    /// Make every subsequent operation on `pin` fail with an I/O error.
    pub fn inject_fault(&self, pin: Pin) {
        tracing::debug!(pin, "fault injected");
        self.bank().faults.insert(pin);
    }

    pub fn clear_fault(&self, pin: Pin) {
        self.bank().faults.remove(&pin);
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.bank().released
    }
}

impl Hardware for VirtualHardware {
    fn configure_output(&self, pin: Pin, initial: Level) -> Result<(), HardwareError> {
        let mut bank = self.bank();
        bank.released = false;
        bank.ensure_usable(pin)?;
        bank.levels.insert(pin, initial);
        tracing::debug!(pin, ?initial, "virtual output configured");
        Ok(())
    }

    fn write(&self, pin: Pin, level: Level) -> Result<(), HardwareError> {
        let mut bank = self.bank();
        bank.ensure_output(pin)?;
        bank.levels.insert(pin, level);
        bank.history.push((pin, level));
        tracing::trace!(pin, ?level, "virtual write");
        Ok(())
    }

    fn read(&self, pin: Pin) -> Result<Level, HardwareError> {
        let bank = self.bank();
        bank.ensure_output(pin)?;
        Ok(bank.levels.get(&pin).copied().unwrap_or_default())
    }

    fn pwm_start(&self, pin: Pin, frequency_hz: f64, duty: f64) -> Result<(), HardwareError> {
        let mut bank = self.bank();
        bank.ensure_output(pin)?;
        bank.pwm.insert(pin, PwmChannel { frequency_hz, duty });
        tracing::debug!(pin, frequency_hz, duty, "virtual pwm started");
        Ok(())
    }

    fn pwm_set_duty(&self, pin: Pin, duty: f64) -> Result<(), HardwareError> {
        let mut bank = self.bank();
        bank.ensure_output(pin)?;
        let channel = bank
            .pwm
            .get_mut(&pin)
            .ok_or(HardwareError::PwmNotStarted(pin))?;
        channel.duty = duty;
        tracing::trace!(pin, duty, "virtual pwm duty");
        Ok(())
    }

    fn pwm_stop(&self, pin: Pin) -> Result<(), HardwareError> {
        let mut bank = self.bank();
        bank.ensure_usable(pin)?;
        bank.pwm
            .remove(&pin)
            .map(|_| ())
            .ok_or(HardwareError::PwmNotStarted(pin))
    }

    fn release_all(&self) -> Result<(), HardwareError> {
        let mut bank = self.bank();
        for level in bank.levels.values_mut() {
            *level = Level::Low;
        }
        bank.pwm.clear();
        bank.released = true;
        tracing::debug!(pins = bank.levels.len(), "virtual hardware released");
        Ok(())
    }
}
