//! Factories for events, messages, and stored records.

use uuid::Uuid;

use vigil_core::event::{
    EventExtensions, EventUser, IngressEvent, InterventionDetails, QueueMessage,
    FRAUD_INTERVENTION_EVENT,
};
use vigil_core::record::PersistedAccountRecord;
use vigil_core::state::AccountState;

/// Fraud-intervention event with the given code, timestamped in millis.
pub fn fraud_event(user_id: &str, code: &str, event_ms: i64) -> IngressEvent {
    IngressEvent {
        event_name: FRAUD_INTERVENTION_EVENT.to_string(),
        timestamp: event_ms.div_euclid(1000),
        event_timestamp_ms: Some(event_ms),
        component_id: "TICF_CRI".to_string(),
        user: EventUser { user_id: user_id.to_string() },
        extensions: EventExtensions {
            intervention: Some(InterventionDetails {
                intervention_code: code.to_string(),
                intervention_reason: "fraud referral".to_string(),
                originating_component_id: Some("CMS".to_string()),
                intervention_predecessor_id: None,
                requester_id: Some("analyst-1".to_string()),
            }),
            ..EventExtensions::default()
        },
    }
}

/// User-led remediation event with the given canonical name.
pub fn user_action_event(user_id: &str, event_name: &str, event_ms: i64) -> IngressEvent {
    IngressEvent {
        event_name: event_name.to_string(),
        timestamp: event_ms.div_euclid(1000),
        event_timestamp_ms: Some(event_ms),
        component_id: "AUTH".to_string(),
        user: EventUser { user_id: user_id.to_string() },
        extensions: EventExtensions {
            intervention: None,
            level_of_confidence: Some("P2".to_string()),
            ci_fail: Some(false),
            has_mitigations: Some(false),
        },
    }
}

/// Wrap an event as a queue message with a fresh id.
pub fn queue_message(event: &IngressEvent) -> QueueMessage {
    QueueMessage {
        message_id: Uuid::new_v4().to_string(),
        body: serde_json::to_string(event).unwrap_or_default(),
    }
}

/// Stored record in the given state with intervention bookkeeping.
pub fn stored_record(state: AccountState, sent_at: i64, applied_at: i64) -> PersistedAccountRecord {
    PersistedAccountRecord {
        state,
        updated_at: applied_at,
        sent_at: Some(sent_at),
        applied_at: Some(applied_at),
        ..PersistedAccountRecord::default()
    }
}
