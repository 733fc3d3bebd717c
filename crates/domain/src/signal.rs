//! Logical signal levels and pin numbering.

use serde::{Deserialize, Serialize};

/// GPIO pin number (BCM numbering on a Raspberry Pi).
pub type Pin = u8;

/// Logical level of a digital output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    /// `High` when `on` is true.
    #[must_use]
    pub fn from_bool(on: bool) -> Self {
        if on { Self::High } else { Self::Low }
    }

    #[must_use]
    pub fn is_high(self) -> bool {
        self == Self::High
    }

    /// Numeric form used in diagnostics (`0` or `1`).
    #[must_use]
    pub fn as_bit(self) -> u8 {
        u8::from(self.is_high())
    }
}
