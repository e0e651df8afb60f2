//! Ingress event wire model.
//!
//! Events arrive once per queue message as JSON, are never mutated, and are
//! discarded after processing. Fraud interventions arrive under the shared
//! envelope name [`FRAUD_INTERVENTION_EVENT`] with a numeric intervention
//! code in their extension; user-led remediation events arrive under their
//! canonical name directly.

use serde::{Deserialize, Serialize};

/// Wire envelope name used by all fraud-intervention events.
pub const FRAUD_INTERVENTION_EVENT: &str = "TICF_ACCOUNT_INTERVENTION";

/// Canonical names of the events the transition graph understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "FRAUD_SUSPEND_ACCOUNT")]
    FraudSuspendAccount,
    #[serde(rename = "FRAUD_UNSUSPEND_ACCOUNT")]
    FraudUnsuspendAccount,
    #[serde(rename = "FRAUD_BLOCK_ACCOUNT")]
    FraudBlockAccount,
    #[serde(rename = "FRAUD_FORCED_USER_PASSWORD_RESET")]
    FraudForcedUserPasswordReset,
    #[serde(rename = "FRAUD_FORCED_USER_IDENTITY_REPROVE")]
    FraudForcedUserIdentityReprove,
    #[serde(rename = "FRAUD_FORCED_USER_PASSWORD_RESET_AND_IDENTITY_REPROVE")]
    FraudForcedUserPasswordResetAndIdentityReprove,
    #[serde(rename = "FRAUD_UNBLOCK_ACCOUNT")]
    FraudUnblockAccount,
    #[serde(rename = "AUTH_PASSWORD_RESET_SUCCESSFUL")]
    AuthPasswordResetSuccessful,
    #[serde(rename = "IPV_IDENTITY_ISSUED")]
    IpvIdentityIssued,
}

impl EventName {
    /// Canonical string form as it appears in graph configuration and audit
    /// output.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::FraudSuspendAccount => "FRAUD_SUSPEND_ACCOUNT",
            EventName::FraudUnsuspendAccount => "FRAUD_UNSUSPEND_ACCOUNT",
            EventName::FraudBlockAccount => "FRAUD_BLOCK_ACCOUNT",
            EventName::FraudForcedUserPasswordReset => "FRAUD_FORCED_USER_PASSWORD_RESET",
            EventName::FraudForcedUserIdentityReprove => "FRAUD_FORCED_USER_IDENTITY_REPROVE",
            EventName::FraudForcedUserPasswordResetAndIdentityReprove => {
                "FRAUD_FORCED_USER_PASSWORD_RESET_AND_IDENTITY_REPROVE"
            }
            EventName::FraudUnblockAccount => "FRAUD_UNBLOCK_ACCOUNT",
            EventName::AuthPasswordResetSuccessful => "AUTH_PASSWORD_RESET_SUCCESSFUL",
            EventName::IpvIdentityIssued => "IPV_IDENTITY_ISSUED",
        }
    }

    /// Parse a canonical user-led event name from the wire.
    ///
    /// Fraud events never resolve this way; their canonical name comes from
    /// the intervention code via the transition graph.
    pub fn from_user_led(raw: &str) -> Option<EventName> {
        match raw {
            "AUTH_PASSWORD_RESET_SUCCESSFUL" => Some(EventName::AuthPasswordResetSuccessful),
            "IPV_IDENTITY_ISSUED" => Some(EventName::IpvIdentityIssued),
            _ => None,
        }
    }

    /// True for events triggered by the user's own remediation, as opposed
    /// to a fraud-desk intervention.
    pub fn is_user_led(&self) -> bool {
        matches!(
            self,
            EventName::AuthPasswordResetSuccessful | EventName::IpvIdentityIssued
        )
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two schema branches an ingress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Fraud-desk intervention carrying a numeric code.
    FraudIntervention,
    /// User-led remediation (password reset, identity re-proof).
    UserAction,
    /// Anything else; rejected by validation.
    Unknown,
}

/// Subject of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUser {
    /// Stable account identifier the event applies to.
    pub user_id: String,
}

/// Fraud-intervention extension fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionDetails {
    /// Numeric transition code, transmitted as a string (`"01"`..`"07"`).
    pub intervention_code: String,
    /// Human-readable reason recorded in the audit trail.
    pub intervention_reason: String,
    /// Component the intervention originated from, if different from the
    /// sending component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_component_id: Option<String>,
    /// Code of the intervention this one supersedes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention_predecessor_id: Option<String>,
    /// Analyst or system that requested the intervention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
}

/// Extension block; exactly one of the two shapes may be populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventExtensions {
    /// Present on fraud-intervention events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention: Option<InterventionDetails>,
    /// Present on user-led identity events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_of_confidence: Option<String>,
    /// Present on user-led identity events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_fail: Option<bool>,
    /// Present on user-led identity events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_mitigations: Option<bool>,
}

impl EventExtensions {
    /// True if any of the three user-action fields is present.
    pub fn has_user_action_fields(&self) -> bool {
        self.level_of_confidence.is_some() || self.ci_fail.is_some() || self.has_mitigations.is_some()
    }
}

/// One inbound event as delivered by the ingress queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressEvent {
    /// Wire event name; either the fraud envelope or a canonical user-led
    /// event name.
    pub event_name: String,
    /// Source event time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Source event time in milliseconds, preferred over `timestamp` when
    /// present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_timestamp_ms: Option<i64>,
    /// Component that published the event.
    pub component_id: String,
    /// Account the event applies to.
    pub user: EventUser,
    /// Category-specific extension fields.
    #[serde(default)]
    pub extensions: EventExtensions,
}

/// One opaque message as delivered by the ingress queue: an id the queue
/// understands and a JSON body that should parse as an [`IngressEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
}

impl IngressEvent {
    /// Schema branch this event falls under, keyed on the wire event name.
    pub fn category(&self) -> EventCategory {
        if self.event_name == FRAUD_INTERVENTION_EVENT {
            EventCategory::FraudIntervention
        } else if EventName::from_user_led(&self.event_name).is_some() {
            EventCategory::UserAction
        } else {
            EventCategory::Unknown
        }
    }

    /// Effective event time in milliseconds; the millisecond field wins when
    /// both are present.
    pub fn effective_timestamp_ms(&self) -> i64 {
        self.event_timestamp_ms.unwrap_or(self.timestamp * 1000)
    }
}
