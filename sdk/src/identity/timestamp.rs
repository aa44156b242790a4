//! Seconds + nanoseconds timestamps used for transaction valid-start times.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// A point in time as whole seconds since the Unix epoch plus a nanosecond
/// remainder. `nanos` is always below [`NANOS_PER_SECOND`], so the derived
/// ordering (seconds, then nanos) is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    seconds: i64,
    nanos: u32,
}

impl Timestamp {
    /// Builds a timestamp, normalising any nanosecond overflow into seconds.
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self {
            seconds: seconds + i64::from(nanos / NANOS_PER_SECOND),
            nanos: nanos % NANOS_PER_SECOND,
        }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Returns this timestamp advanced by `n` nanoseconds, carrying into
    /// the seconds field.
    pub fn plus_nanos(self, n: u64) -> Self {
        let total = u64::from(self.nanos) + n;
        let carry = (total / u64::from(NANOS_PER_SECOND)) as i64;
        Self {
            seconds: self.seconds + carry,
            nanos: (total % u64::from(NANOS_PER_SECOND)) as u32,
        }
    }

    /// Converts to a chrono `DateTime`, if the value is representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::new(dt.timestamp(), dt.timestamp_subsec_nanos())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}
