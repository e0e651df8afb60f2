//! # Vigil Testkit
//!
//! In-memory effect handlers and factories for exercising the pipeline
//! without real collaborators: a scriptable store, a manual clock, recording
//! egress and metrics sinks, and event builders.

pub mod clock;
pub mod egress;
pub mod factories;
pub mod metrics;
pub mod store;

pub use clock::ManualClock;
pub use egress::RecordingAuditSink;
pub use factories::{fraud_event, queue_message, stored_record, user_action_event};
pub use metrics::{MetricSample, RecordingMetrics};
pub use store::MemoryAccountStore;

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Install a compact fmt subscriber honoring `RUST_LOG`, once per process.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}
