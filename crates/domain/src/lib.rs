//! # housectl-domain
//!
//! Pure domain model for the housectl home automation controller.
//!
//! ## Responsibilities
//! - Foundational types: error taxonomy, timestamps, logical signal levels
//! - Define **Devices** (light, servo door, motion device) and their capabilities
//! - Define the **command grammar** (`ON`, `OFF`, `OPEN`, `SPEED:<n>`, …) and
//!   parse payloads into closed [`command::DeviceCommand`] values
//! - Plan motor actuations from a command and the current motor state
//! - Hold the **device state store** and the published status records
//! - Model the controller lifecycle state machine
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod signal;
pub mod time;

pub mod command;
pub mod device;
pub mod lifecycle;
pub mod motion;
pub mod state;
pub mod status;
