//! Controller lifecycle: `Starting → Online → ShuttingDown → Offline`.

use std::fmt;

/// Lifecycle stage of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Starting,
    Online,
    ShuttingDown,
    /// Terminal.
    Offline,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Starting → ShuttingDown` is allowed so a failed start-up can still
    /// run the shutdown path.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Online | Self::ShuttingDown)
                | (Self::Online, Self::ShuttingDown)
                | (Self::ShuttingDown, Self::Offline)
        )
    }

    /// `true` once shutdown has begun.
    #[must_use]
    pub fn is_terminating(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Offline)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting"),
            Self::Online => f.write_str("online"),
            Self::ShuttingDown => f.write_str("shutting_down"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Why the controller is shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / SIGTERM.
    Signal,
    /// The inbound command channel closed.
    InboundClosed,
    /// Unrecoverable top-level failure.
    Fatal(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("termination signal"),
            Self::InboundClosed => f.write_str("inbound channel closed"),
            Self::Fatal(reason) => write!(f, "fatal error: {reason}"),
        }
    }
}
