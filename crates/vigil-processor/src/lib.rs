//! # Vigil Processor — batch event pipeline
//!
//! Consumes batches of opaque queue messages, runs each through the
//! validate → resolve → guard → decide → persist → count → audit pipeline
//! concurrently, and returns the ids the queue should redeliver. All
//! collaborators arrive as injected effect traits from `vigil-core`; this
//! crate owns only orchestration, failure classification, and the audit
//! reporter.

pub mod audit;
pub mod counters;
pub mod processor;

pub use audit::AuditReporter;
pub use counters::Counters;
pub use processor::{fetch_decoded_history, BatchOutcome, BatchProcessor, ProcessorConfig};
pub use vigil_core::QueueMessage;
