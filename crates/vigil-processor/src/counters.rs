//! Observability counters derived from state transitions.

use std::sync::Arc;

use vigil_core::effects::MetricsSink;
use vigil_core::{AccountState, EventName};

/// Gauge names.
pub const ACCOUNTS_BLOCKED: &str = "accounts_blocked";
pub const ACCOUNTS_SUSPENDED: &str = "accounts_suspended";
/// Duration from an intervention being applied to the suspension clearing.
pub const TIME_TO_RESOLVE_MS: &str = "intervention_time_to_resolve_ms";

/// Emits gauge deltas and resolution durations for applied transitions.
pub struct Counters {
    metrics: Arc<dyn MetricsSink>,
}

impl Counters {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Counters { metrics }
    }

    /// Compare the state before and after an applied transition.
    ///
    /// `applied_at_before` is the stored record's applied timestamp from the
    /// read snapshot; it anchors the time-to-resolve duration when the
    /// suspension clears.
    pub fn record_transition(
        &self,
        before: &AccountState,
        after: &AccountState,
        applied_at_before: Option<i64>,
        now_ms: i64,
        event: EventName,
    ) {
        match (before.blocked, after.blocked) {
            (false, true) => self.metrics.count(ACCOUNTS_BLOCKED, 1, &[]),
            (true, false) => self.metrics.count(ACCOUNTS_BLOCKED, -1, &[]),
            _ => {}
        }
        match (before.suspended, after.suspended) {
            (false, true) => self.metrics.count(ACCOUNTS_SUSPENDED, 1, &[]),
            (true, false) => {
                self.metrics.count(ACCOUNTS_SUSPENDED, -1, &[]);
                if let Some(applied_at) = applied_at_before {
                    let elapsed = now_ms - applied_at;
                    if elapsed >= 0 {
                        self.metrics.count(
                            TIME_TO_RESOLVE_MS,
                            elapsed,
                            &[("event", event.as_str())],
                        );
                    }
                }
            }
            _ => {}
        }
    }
}
