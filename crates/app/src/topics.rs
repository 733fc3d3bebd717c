//! Topic layout under the configured base prefix.
//!
//! ```text
//! <base>/<device>                 inbound commands
//! <base>/<device>/status          plain status token (retained)
//! <base>/<device>/motor_status    motor diagnostics (retained)
//! <base>/<device>/error           error reports
//! <base>/status                   aggregate snapshot (retained)
//! <base>/system                   controller info and last will (retained)
//! ```

/// Builds every topic the controller uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Command topic of `device`.
    #[must_use]
    pub fn command(&self, device: &str) -> String {
        format!("{}/{device}", self.base)
    }

    #[must_use]
    pub fn status(&self, device: &str) -> String {
        format!("{}/{device}/status", self.base)
    }

    #[must_use]
    pub fn diagnostics(&self, device: &str) -> String {
        format!("{}/{device}/motor_status", self.base)
    }

    #[must_use]
    pub fn aggregate(&self) -> String {
        format!("{}/status", self.base)
    }

    #[must_use]
    pub fn system(&self) -> String {
        format!("{}/system", self.base)
    }

    /// Error topic paired with an inbound topic.
    #[must_use]
    pub fn error(topic: &str) -> String {
        format!("{topic}/error")
    }
}
