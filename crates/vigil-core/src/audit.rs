//! Outbound audit-trail event model.
//!
//! Every processed ingress event — applied or ignored — is described by one
//! audit event sent to the downstream queue, except for the suppressed
//! no-op case handled by the reporter. The model here is pure data; the
//! builder lives with the processor.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::EventUser;
use crate::graph::TransitionCode;
use crate::state::AccountState;

/// Outbound event names.
pub const TRANSITION_APPLIED: &str = "INTERVENTION_TRANSITION_APPLIED";
pub const TRANSITION_IGNORED: &str = "INTERVENTION_TRANSITION_IGNORED";

/// Description used for user-led remediation triggers.
pub const USER_LED_ACTION: &str = "USER_LED_ACTION";

/// Why an event was ignored rather than applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Stale,
    AccountDeleted,
    NotAllowed,
    InFuture,
    LowConfidence,
    DataAnomaly,
}

impl IgnoreReason {
    /// Human-readable description carried on the audit event.
    pub fn description(&self) -> &'static str {
        match self {
            IgnoreReason::Stale => "predates latest applied intervention",
            IgnoreReason::AccountDeleted => "target account deleted",
            IgnoreReason::NotAllowed => "transition not allowed from current state",
            IgnoreReason::InFuture => "received event is in the future",
            IgnoreReason::LowConfidence => "level of confidence below P2",
            IgnoreReason::DataAnomaly => "more than one record found for account",
        }
    }

    /// Stable label used as a metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            IgnoreReason::Stale => "stale",
            IgnoreReason::AccountDeleted => "account_deleted",
            IgnoreReason::NotAllowed => "not_allowed",
            IgnoreReason::InFuture => "in_future",
            IgnoreReason::LowConfidence => "low_confidence",
            IgnoreReason::DataAnomaly => "data_anomaly",
        }
    }
}

/// Outcome of processing one ingress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReport {
    /// Transition applied and persisted.
    Applied,
    /// Event ignored for the given reason; nothing persisted.
    Ignored(IgnoreReason),
}

impl TransitionReport {
    pub fn event_name(&self) -> &'static str {
        match self {
            TransitionReport::Applied => TRANSITION_APPLIED,
            TransitionReport::Ignored(_) => TRANSITION_IGNORED,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, TransitionReport::Ignored(_))
    }
}

/// Externally reported account standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedState {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "SUSPENDED")]
    Suspended,
    #[serde(rename = "PERMANENTLY_SUSPENDED")]
    PermanentlySuspended,
    #[serde(rename = "DELETED")]
    Deleted,
}

/// Remediation the user must complete, when one is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedAction {
    #[serde(rename = "RESET_PASSWORD")]
    ResetPassword,
    #[serde(rename = "REPROVE_IDENTITY")]
    ReproveIdentity,
    #[serde(rename = "RESET_PASSWORD_AND_REPROVE_IDENTITY")]
    ResetPasswordAndReproveIdentity,
}

/// The derived `{state, action}` pair reported downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub state: ReportedState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ReportedAction>,
}

/// Derive the reported pair from the raw flags. Precedence matters: the
/// first matching row wins.
pub fn summarize(state: &AccountState, deleted: bool) -> AccountSummary {
    let (reported, action) = if deleted {
        (ReportedState::Deleted, None)
    } else if state.blocked {
        (ReportedState::PermanentlySuspended, None)
    } else if !state.suspended {
        (ReportedState::Active, None)
    } else if state.reset_password && state.reprove_identity {
        (ReportedState::Active, Some(ReportedAction::ResetPasswordAndReproveIdentity))
    } else if state.reset_password {
        (ReportedState::Active, Some(ReportedAction::ResetPassword))
    } else if state.reprove_identity {
        (ReportedState::Active, Some(ReportedAction::ReproveIdentity))
    } else {
        (ReportedState::Suspended, None)
    };
    AccountSummary { state: reported, action }
}

/// What triggered this audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDetails {
    /// Queue message id of the ingress event.
    pub message_id: String,
    /// Wire event name of the ingress event.
    pub event_name: String,
}

/// Extension block of the outbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditExtensions {
    pub trigger: TriggerDetails,
    /// `USER_LED_ACTION` or the applied intervention's canonical name.
    pub description: String,
    /// Codes the account can transition on next, restricted to named
    /// interventions; internal user-led codes never appear here.
    pub allowable_interventions: Vec<TransitionCode>,
    pub account: AccountSummary,
}

/// One outbound audit record. Constructed, sent, discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_name: String,
    pub timestamp: i64,
    pub event_timestamp_ms: i64,
    pub timestamp_formatted: String,
    pub component_id: String,
    pub user: EventUser,
    pub extensions: AuditExtensions,
}
