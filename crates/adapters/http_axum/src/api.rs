//! JSON handlers.

pub mod publish;
pub mod status;
