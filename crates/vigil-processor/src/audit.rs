//! Audit event construction and emission.
//!
//! The reporter owns the egress seam: it builds the outbound record from the
//! ingress event and the engine output, applies the suppression rule, and
//! sends. Egress failures are logged and metered but never propagate — a
//! lost audit event must not fail the message that produced it.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use vigil_core::audit::{
    summarize, AuditEvent, AuditExtensions, TransitionReport, TriggerDetails, USER_LED_ACTION,
};
use vigil_core::effects::{AuditSink, Clock, MetricsSink};
use vigil_core::event::EventCategory;
use vigil_core::{AccountState, EngineOutput, EventName, IngressEvent, TransitionGraph};

/// Builds and publishes audit events for processed messages.
pub struct AuditReporter {
    graph: Arc<TransitionGraph>,
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    component_id: String,
}

impl AuditReporter {
    pub fn new(
        graph: Arc<TransitionGraph>,
        sink: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
        component_id: String,
    ) -> Self {
        AuditReporter { graph, sink, clock, metrics, component_id }
    }

    /// Construct the outbound record for one processed message.
    pub fn build(
        &self,
        report: TransitionReport,
        event: &IngressEvent,
        message_id: &str,
        resolved: Option<EventName>,
        output: Option<&EngineOutput>,
        account_state: &AccountState,
        account_deleted: bool,
    ) -> AuditEvent {
        let now = self.clock.now();

        let description = if event.category() == EventCategory::UserAction {
            USER_LED_ACTION.to_string()
        } else {
            self.intervention_description(event, resolved, output)
        };

        let allowable_interventions = output
            .map(|output| {
                output
                    .next_allowable_interventions
                    .iter()
                    .filter(|code| self.graph.intervention_name_for_code(code.as_str()).is_some())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        AuditEvent {
            event_id: Uuid::new_v4(),
            event_name: report.event_name().to_string(),
            timestamp: now.seconds,
            event_timestamp_ms: now.millis,
            timestamp_formatted: now.iso8601,
            component_id: self.component_id.clone(),
            user: event.user.clone(),
            extensions: AuditExtensions {
                trigger: TriggerDetails {
                    message_id: message_id.to_string(),
                    event_name: event.event_name.clone(),
                },
                description,
                allowable_interventions,
                account: summarize(account_state, account_deleted),
            },
        }
    }

    /// Build and send, applying the suppression rule first.
    pub async fn publish(
        &self,
        report: TransitionReport,
        event: &IngressEvent,
        message_id: &str,
        resolved: Option<EventName>,
        output: Option<&EngineOutput>,
        account_state: &AccountState,
        account_deleted: bool,
    ) {
        // A no-op user action against an already-clean account is not
        // audit-worthy.
        let suppress = report.is_ignored()
            && event.category() == EventCategory::UserAction
            && output.map(|o| !o.new_state.is_restricted()).unwrap_or(false);
        if suppress {
            debug!(message_id, "audit event suppressed for no-op user action");
            self.metrics.count("audit_event_suppressed", 1, &[]);
            return;
        }

        let audit = self.build(
            report,
            event,
            message_id,
            resolved,
            output,
            account_state,
            account_deleted,
        );
        match self.sink.send(&audit).await {
            Ok(()) => {
                self.metrics.count("published_to_egress", 1, &[]);
            }
            Err(error) => {
                warn!(message_id, %error, "failed to publish audit event");
                self.metrics.count("egress_publish_failed", 1, &[]);
            }
        }
    }

    fn intervention_description(
        &self,
        event: &IngressEvent,
        resolved: Option<EventName>,
        output: Option<&EngineOutput>,
    ) -> String {
        if let Some(name) = output.and_then(|o| o.intervention_name.clone()) {
            return name;
        }
        if let Some(name) = resolved.and_then(|e| self.graph.intervention_name_for_event(e)) {
            return name.to_string();
        }
        event
            .extensions
            .intervention
            .as_ref()
            .and_then(|i| self.graph.intervention_name_for_code(&i.intervention_code))
            .unwrap_or("UNKNOWN")
            .to_string()
    }
}
