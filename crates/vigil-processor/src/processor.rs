//! The per-message pipeline and batch fan-out.
//!
//! Every message runs the same pipeline: validate, resolve, guard, decide,
//! persist, count, audit. Outcomes fall into exactly two failure classes:
//! terminal (the message can never succeed; acknowledge and drop) and
//! transient (infrastructure trouble; report the id so the queue
//! redelivers). Getting that split right is the core failure-handling
//! contract of the service — a deterministically doomed message must never
//! loop, and a transiently failed one must never be lost.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use vigil_core::audit::{IgnoreReason, TransitionReport};
use vigil_core::effects::{AccountStore, AuditSink, Clock, MetricsSink, StoreError};
use vigil_core::event::EventCategory;
use vigil_core::validate::{validate_event, validate_intervention_event, ValidationError};
use vigil_core::{
    history, AccountState, EngineError, EngineOutput, EventName, IngressEvent, QueueMessage,
    RecordPatch, StateEngine, Timestamp, TransitionGraph, WriteCondition,
};

use crate::audit::AuditReporter;
use crate::counters::Counters;

/// Batch-level metric names.
pub const INVALID_BATCH_RECEIVED: &str = "invalid_batch_received";
pub const MESSAGE_DROPPED: &str = "message_dropped";
pub const MESSAGE_RETRIED: &str = "message_retried";

/// Service-level configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Component id stamped on outbound audit events.
    pub component_id: String,
    /// Level of confidence required on identity re-proof events.
    pub required_confidence: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            component_id: "VIGIL".to_string(),
            required_confidence: "P2".to_string(),
        }
    }
}

/// Batch result: ids the queue should redeliver. Everything else is
/// acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub failed_message_ids: Vec<String>,
}

/// Internal per-message outcome classification.
enum Failure {
    /// Will never succeed; acknowledge. The label becomes a metric
    /// dimension.
    Terminal(&'static str),
    /// May succeed on redelivery.
    Transient(String),
}

/// The queue-facing batch pipeline.
pub struct BatchProcessor {
    engine: StateEngine,
    store: Arc<dyn AccountStore>,
    reporter: AuditReporter,
    counters: Counters,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    config: ProcessorConfig,
}

impl BatchProcessor {
    pub fn new(
        graph: Arc<TransitionGraph>,
        store: Arc<dyn AccountStore>,
        sink: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
        config: ProcessorConfig,
    ) -> Self {
        let reporter = AuditReporter::new(
            Arc::clone(&graph),
            sink,
            Arc::clone(&clock),
            Arc::clone(&metrics),
            config.component_id.clone(),
        );
        BatchProcessor {
            engine: StateEngine::new(graph),
            store,
            reporter,
            counters: Counters::new(Arc::clone(&metrics)),
            clock,
            metrics,
            config,
        }
    }

    /// Process one batch. Never fails: every per-message error is converted
    /// into either an acknowledgement or an entry in the returned retry
    /// list.
    pub async fn process(&self, batch: &[QueueMessage]) -> BatchOutcome {
        if batch.is_empty() {
            warn!("received empty batch");
            self.metrics.count(INVALID_BATCH_RECEIVED, 1, &[]);
            return BatchOutcome::default();
        }

        let results = join_all(batch.iter().map(|message| self.process_message(message))).await;

        let mut failed_message_ids = Vec::new();
        for (message, result) in batch.iter().zip(results) {
            match result {
                Ok(()) => {}
                Err(Failure::Terminal(reason)) => {
                    self.metrics.count(MESSAGE_DROPPED, 1, &[("reason", reason)]);
                }
                Err(Failure::Transient(reason)) => {
                    warn!(message_id = %message.message_id, %reason, "message scheduled for retry");
                    self.metrics.count(MESSAGE_RETRIED, 1, &[]);
                    failed_message_ids.push(message.message_id.clone());
                }
            }
        }
        BatchOutcome { failed_message_ids }
    }

    async fn process_message(&self, message: &QueueMessage) -> Result<(), Failure> {
        let message_id = message.message_id.as_str();

        let event: IngressEvent = serde_json::from_str(&message.body).map_err(|error| {
            warn!(message_id, %error, "message body is not a well-formed event");
            Failure::Transient(format!("malformed message body: {error}"))
        })?;

        self.validate(&event).map_err(|error| {
            info!(message_id, %error, "event failed validation, dropping");
            Failure::Terminal("validation_failed")
        })?;

        let resolved = self.resolve_event_name(&event)?;
        let now = self.clock.now();

        // Identity re-proofs below the required confidence never apply.
        if resolved == EventName::IpvIdentityIssued {
            let confidence = event.extensions.level_of_confidence.as_deref().unwrap_or("");
            if confidence != self.config.required_confidence {
                info!(message_id, confidence, "identity re-proof below required confidence");
                self.reporter
                    .publish(
                        TransitionReport::Ignored(IgnoreReason::LowConfidence),
                        &event,
                        message_id,
                        Some(resolved),
                        None,
                        &AccountState::OKAY,
                        false,
                    )
                    .await;
                return Err(Failure::Terminal("low_confidence"));
            }
        }

        // An event from the future may become valid once time passes, so it
        // is retried rather than dropped.
        let effective_ms = event.effective_timestamp_ms();
        if effective_ms > now.millis {
            warn!(message_id, effective_ms, now_ms = now.millis, "received event is in the future");
            self.reporter
                .publish(
                    TransitionReport::Ignored(IgnoreReason::InFuture),
                    &event,
                    message_id,
                    Some(resolved),
                    None,
                    &AccountState::OKAY,
                    false,
                )
                .await;
            return Err(Failure::Transient("event timestamp in the future".to_string()));
        }

        let record = match self.store.fetch(&event.user.user_id).await {
            Ok(record) => record,
            Err(StoreError::TooManyRecords) => {
                error!(message_id, user_id = %event.user.user_id, "duplicate records for account");
                self.reporter
                    .publish(
                        TransitionReport::Ignored(IgnoreReason::DataAnomaly),
                        &event,
                        message_id,
                        Some(resolved),
                        None,
                        &AccountState::OKAY,
                        false,
                    )
                    .await;
                return Err(Failure::Terminal("too_many_records"));
            }
            Err(error) => {
                return Err(Failure::Transient(format!("store read failed: {error}")));
            }
        };

        // The default-okay interpretation of an absent record happens here,
        // once.
        let current_state = record.as_ref().map(|r| r.state).unwrap_or(AccountState::OKAY);
        let latest_applied = record.as_ref().map(|r| r.latest_applied_ms()).unwrap_or(0);

        if record.as_ref().is_some_and(|r| r.is_account_deleted) {
            info!(message_id, user_id = %event.user.user_id, "target account deleted");
            self.reporter
                .publish(
                    TransitionReport::Ignored(IgnoreReason::AccountDeleted),
                    &event,
                    message_id,
                    Some(resolved),
                    None,
                    &current_state,
                    true,
                )
                .await;
            return Err(Failure::Terminal("account_deleted"));
        }

        // Sole defense against at-least-once redelivery and reordering: the
        // source timestamp must strictly advance per account.
        if effective_ms <= latest_applied {
            info!(message_id, effective_ms, latest_applied, "event predates latest applied intervention");
            self.reporter
                .publish(
                    TransitionReport::Ignored(IgnoreReason::Stale),
                    &event,
                    message_id,
                    Some(resolved),
                    None,
                    &current_state,
                    false,
                )
                .await;
            return Err(Failure::Terminal("stale_event"));
        }

        let output = match self.engine.apply_transition(resolved, Some(&current_state)) {
            Ok(output) => output,
            Err(EngineError::Rejected { current, .. }) => {
                info!(message_id, %resolved, "transition not allowed from current state");
                let unchanged = EngineOutput {
                    new_state: current,
                    intervention_name: None,
                    next_allowable_interventions: Vec::new(),
                };
                self.reporter
                    .publish(
                        TransitionReport::Ignored(IgnoreReason::NotAllowed),
                        &event,
                        message_id,
                        Some(resolved),
                        Some(&unchanged),
                        &current,
                        false,
                    )
                    .await;
                return Err(Failure::Terminal("transition_rejected"));
            }
            Err(EngineError::Configuration(reason)) => {
                // Graph/data disagreement. Must not be swallowed as a
                // terminal per-message outcome.
                error!(message_id, %reason, "configuration error during transition");
                return Err(Failure::Transient(format!("configuration error: {reason}")));
            }
        };

        let patch = self.build_patch(&event, resolved, &output, effective_ms, &now)?;
        let condition = WriteCondition::AppliedAtUnchanged(record.as_ref().and_then(|r| r.applied_at));
        match self.store.apply_patch(&event.user.user_id, &patch, &condition).await {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                // Lost a race with a concurrent writer; redelivery re-reads
                // and the staleness guard settles which event wins.
                info!(message_id, user_id = %event.user.user_id, "write condition failed");
                return Err(Failure::Transient("write condition failed".to_string()));
            }
            Err(error) => {
                return Err(Failure::Transient(format!("store write failed: {error}")));
            }
        }

        self.counters.record_transition(
            &current_state,
            &output.new_state,
            record.as_ref().and_then(|r| r.applied_at),
            now.millis,
            resolved,
        );

        debug!(message_id, user_id = %event.user.user_id, %resolved, "transition applied");
        self.reporter
            .publish(
                TransitionReport::Applied,
                &event,
                message_id,
                Some(resolved),
                Some(&output),
                &output.new_state,
                false,
            )
            .await;
        Ok(())
    }

    fn validate(&self, event: &IngressEvent) -> Result<(), ValidationError> {
        match event.category() {
            EventCategory::FraudIntervention => validate_intervention_event(event),
            _ => validate_event(event),
        }
    }

    fn resolve_event_name(&self, event: &IngressEvent) -> Result<EventName, Failure> {
        match event.category() {
            EventCategory::FraudIntervention => {
                let code = event
                    .extensions
                    .intervention
                    .as_ref()
                    .map(|i| i.intervention_code.as_str())
                    .unwrap_or_default();
                self.engine.event_for_code(code).map_err(|error| {
                    // Codes are part of the fixed contract; an unmapped one
                    // means the graph is out of date, not that the data is
                    // bad.
                    error!(code, %error, "intervention code has no edge in the graph");
                    Failure::Transient(format!("unmapped intervention code `{code}`"))
                })
            }
            EventCategory::UserAction => EventName::from_user_led(&event.event_name)
                .ok_or_else(|| Failure::Terminal("validation_failed")),
            EventCategory::Unknown => Err(Failure::Terminal("validation_failed")),
        }
    }

    fn build_patch(
        &self,
        event: &IngressEvent,
        resolved: EventName,
        output: &EngineOutput,
        effective_ms: i64,
        now: &Timestamp,
    ) -> Result<RecordPatch, Failure> {
        match resolved {
            EventName::AuthPasswordResetSuccessful => Ok(RecordPatch::PasswordReset {
                state: output.new_state,
                updated_at: now.millis,
                reset_password_at: now.millis,
            }),
            EventName::IpvIdentityIssued => Ok(RecordPatch::IdentityReprove {
                state: output.new_state,
                updated_at: now.millis,
                reproved_identity_at: now.millis,
            }),
            _ => {
                let intervention_name = output.intervention_name.clone().ok_or_else(|| {
                    // Graph validation guarantees fraud edges carry a name.
                    Failure::Transient("fraud edge carries no intervention name".to_string())
                })?;
                let history_entry = history::encode(event, now)
                    .map_err(|error| Failure::Transient(format!("history encoding failed: {error}")))?;
                Ok(RecordPatch::Intervention {
                    state: output.new_state,
                    updated_at: now.millis,
                    intervention_name,
                    sent_at: effective_ms,
                    applied_at: now.millis,
                    history_entry,
                })
            }
        }
    }
}

/// Look up an account's stored record, decoding its history for display.
///
/// Convenience for read-side collaborators; the pipeline itself never needs
/// decoded history.
pub async fn fetch_decoded_history(
    store: &dyn AccountStore,
    graph: &TransitionGraph,
    account_id: &str,
) -> Result<Vec<vigil_core::history::HistoryEntry>, StoreError> {
    let record = store.fetch(account_id).await?;
    let record = match record {
        Some(record) => record,
        None => return Ok(Vec::new()),
    };
    let mut entries = Vec::with_capacity(record.history.len());
    for raw in &record.history {
        match history::decode(raw, graph) {
            Ok(entry) => entries.push(entry),
            Err(error) => {
                warn!(account_id, %error, "skipping undecodable history entry");
            }
        }
    }
    Ok(entries)
}
