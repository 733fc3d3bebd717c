//! # housectl-adapter-virtual
//!
//! Virtual hardware that keeps every pin in memory, for running the
//! controller without a GPIO header and for end-to-end tests.
//!
//! ## Behaviour
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `configure_output` | Claims the pin at the given level |
//! | `write` / `read` | Sets / returns the stored level, records the write |
//! | `pwm_*` | Tracks frequency and duty of a per-pin channel |
//! | `release_all` | Lowers every pin, stops every channel, refuses further writes |
//!
//! Faults can be injected per pin to exercise the error paths.
//!
//! ## Dependency rule
//!
//! Depends on `housectl-app` (port traits) and `housectl-domain` only.

mod bank;

pub use bank::{PwmChannel, VirtualHardware};
