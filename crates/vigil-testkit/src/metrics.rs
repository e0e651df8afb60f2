//! Recording metrics sink for testing.

use parking_lot::Mutex;

use vigil_core::effects::MetricsSink;

/// One recorded count call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    pub name: String,
    pub value: i64,
    pub dimensions: Vec<(String, String)>,
}

/// Sink that records every count call.
#[derive(Default)]
pub struct RecordingMetrics {
    samples: Mutex<Vec<MetricSample>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All samples recorded under a name.
    pub fn samples(&self, name: &str) -> Vec<MetricSample> {
        self.samples
            .lock()
            .iter()
            .filter(|sample| sample.name == name)
            .cloned()
            .collect()
    }

    /// Sum of all values recorded under a name.
    pub fn total(&self, name: &str) -> i64 {
        self.samples
            .lock()
            .iter()
            .filter(|sample| sample.name == name)
            .map(|sample| sample.value)
            .sum()
    }
}

impl MetricsSink for RecordingMetrics {
    fn count(&self, name: &str, value: i64, dimensions: &[(&str, &str)]) {
        self.samples.lock().push(MetricSample {
            name: name.to_string(),
            value,
            dimensions: dimensions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }
}
