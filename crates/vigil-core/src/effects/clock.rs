//! Clock seam.
//!
//! The future-timestamp and staleness guards compare against "now", so the
//! clock is injected rather than read ambiently; tests drive it manually.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One observation of the current time, in the three forms the pipeline and
/// the audit trail need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Milliseconds since the Unix epoch.
    pub millis: i64,
    /// RFC 3339 rendering, millisecond precision, UTC.
    pub iso8601: String,
}

impl Timestamp {
    /// Build all three forms from epoch milliseconds.
    pub fn from_unix_millis(millis: i64) -> Self {
        let iso8601 = DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        Timestamp { seconds: millis.div_euclid(1000), millis, iso8601 }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Wall clock used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(Utc::now().timestamp_millis())
    }
}
