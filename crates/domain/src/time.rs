//! Timestamps stamped on status snapshots, error records, and the last will.

use chrono::{DateTime, Utc};

/// UTC timestamp serialised as RFC 3339 in every outbound record.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}
