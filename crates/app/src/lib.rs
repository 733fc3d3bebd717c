//! # housectl-app
//!
//! Application layer — actuator drivers, command dispatch, and the
//! controller lifecycle, written against **port traits**.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `Hardware` — digital outputs and PWM channels addressed by pin
//!   - `MessagePublisher` / `Transport` — publish, subscribe, connection state
//! - Drive the actuators: on/off output, servo, DC motor, and stepper
//! - Run one **motor worker** per motion device so a long travel never blocks
//!   the dispatcher and can be pre-empted by an emergency stop
//! - **Dispatch** inbound commands, keep the device state store, and publish
//!   status, diagnostics, and error reports
//! - Own the **controller lifecycle** (`Starting → Online → ShuttingDown → Offline`)
//!
//! ## Dependency rule
//! Depends on `housectl-domain` only (plus `tokio` for tasks, channels, and
//! timers). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod drivers;
pub mod ingress;
pub mod motor;
pub mod ports;
pub mod publisher;
pub mod topics;

#[cfg(test)]
pub(crate) mod testing;
