//! # Vigil Core — account intervention domain
//!
//! Pure domain logic for the account intervention service: the validated
//! transition graph, the state engine that decides transitions, the compact
//! history codec, the ingress event model and its validation, the persisted
//! record with its closed patch set, the outbound audit model, and the
//! effect traits behind which all I/O collaborators sit.
//!
//! Nothing in this crate performs I/O. Correctness-critical decisions are
//! all here, exhaustively unit-testable against the full transition table.

pub mod audit;
pub mod effects;
pub mod engine;
pub mod event;
pub mod graph;
pub mod history;
pub mod record;
pub mod state;
pub mod validate;

pub use audit::{AccountSummary, AuditEvent, IgnoreReason, TransitionReport};
pub use effects::{AccountStore, AuditSink, Clock, MetricsSink, StoreError, Timestamp};
pub use engine::{EngineError, EngineOutput, StateEngine};
pub use event::{EventCategory, EventName, IngressEvent, QueueMessage};
pub use graph::{GraphError, TransitionCode, TransitionGraph};
pub use record::{PersistedAccountRecord, RecordPatch, WriteCondition};
pub use state::AccountState;
pub use validate::ValidationError;
