//! Trait seams for the external collaborators.
//!
//! The pipeline only ever talks to the store, the egress queue, the clock,
//! and the metrics sink through these traits; concrete clients live outside
//! this workspace and in-memory handlers live in the testkit. Logging has no
//! seam — `tracing` macros are used directly.

pub mod clock;
pub mod egress;
pub mod metrics;
pub mod store;

pub use clock::{Clock, SystemClock, Timestamp};
pub use egress::{AuditSink, EgressError};
pub use metrics::MetricsSink;
pub use store::{AccountStore, StoreError};
