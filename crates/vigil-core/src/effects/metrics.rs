//! Metrics seam. Fire-and-forget counters and gauge deltas.

/// Counter/gauge sink. `value` may be negative for gauge decrements.
pub trait MetricsSink: Send + Sync {
    fn count(&self, name: &str, value: i64, dimensions: &[(&str, &str)]);
}

impl<T: MetricsSink + ?Sized> MetricsSink for std::sync::Arc<T> {
    fn count(&self, name: &str, value: i64, dimensions: &[(&str, &str)]) {
        (**self).count(name, value, dimensions)
    }
}
