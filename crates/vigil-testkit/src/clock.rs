//! Manually driven clock for deterministic guard behavior.

use parking_lot::Mutex;

use vigil_core::effects::{Clock, Timestamp};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: Mutex<i64>,
}

impl ManualClock {
    /// Start at the given epoch milliseconds.
    pub fn at(millis: i64) -> Self {
        ManualClock { millis: Mutex::new(millis) }
    }

    /// Set the absolute time.
    pub fn set(&self, millis: i64) {
        *self.millis.lock() = millis;
    }

    /// Advance by the given amount.
    pub fn advance(&self, millis: i64) {
        *self.millis.lock() += millis;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(*self.millis.lock())
    }
}
