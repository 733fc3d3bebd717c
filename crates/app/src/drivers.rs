//! Actuator drivers — translate validated values into pin operations.
//!
//! Drivers never see raw payloads and never know about topics. Every method
//! returns a [`HardwareError`](housectl_domain::error::HardwareError); the
//! caller decides which device it is attributed to.

pub mod binary;
pub mod dc_motor;
pub mod servo;
pub mod stepper;

pub use binary::BinaryOutput;
pub use dc_motor::DcMotor;
pub use servo::Servo;
pub use stepper::Stepper;
