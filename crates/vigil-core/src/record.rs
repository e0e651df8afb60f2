//! Persisted account record and the closed set of write patches.
//!
//! A record exists per account, keyed by account identifier, and is only
//! ever mutated through one of the [`RecordPatch`] variants; each variant
//! carries exactly the fields it sets, and the store adapter translates it
//! into the store's native partial-update syntax. Records are never deleted
//! by this system; deletion is a flag owned by an external consumer.

use serde::{Deserialize, Serialize};

use crate::state::AccountState;

fn default_audit_level() -> String {
    "standard".to_string()
}

/// Durable per-account state as held by the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAccountRecord {
    /// Current restriction flags.
    #[serde(flatten)]
    pub state: AccountState,
    /// When this record was last written, epoch millis.
    pub updated_at: i64,
    /// Source timestamp of the last applied intervention event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<i64>,
    /// When this system applied the last intervention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<i64>,
    /// Canonical name of the last applied intervention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention_name: Option<String>,
    /// When the user last completed a forced password reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_at: Option<i64>,
    /// When the user last re-proved their identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reproved_identity_at: Option<i64>,
    /// Set by the deletion consumer; a deleted account accepts no events.
    #[serde(default)]
    pub is_account_deleted: bool,
    /// Append-only audit trail, one encoded entry per applied intervention.
    #[serde(default)]
    pub history: Vec<String>,
    /// Audit verbosity requested for this account.
    #[serde(default = "default_audit_level")]
    pub audit_level: String,
}

impl Default for PersistedAccountRecord {
    fn default() -> Self {
        PersistedAccountRecord {
            state: AccountState::OKAY,
            updated_at: 0,
            sent_at: None,
            applied_at: None,
            intervention_name: None,
            reset_password_at: None,
            reproved_identity_at: None,
            is_account_deleted: false,
            history: Vec::new(),
            audit_level: default_audit_level(),
        }
    }
}

impl PersistedAccountRecord {
    /// Timestamp the staleness guard compares against: the latest of
    /// `sent_at` and `applied_at`, floored at zero.
    pub fn latest_applied_ms(&self) -> i64 {
        self.sent_at.unwrap_or(0).max(self.applied_at.unwrap_or(0)).max(0)
    }
}

/// One write, as a closed tagged union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPatch {
    /// An applied fraud intervention.
    Intervention {
        state: AccountState,
        updated_at: i64,
        intervention_name: String,
        sent_at: i64,
        applied_at: i64,
        history_entry: String,
    },
    /// A successful user-led password reset.
    PasswordReset {
        state: AccountState,
        updated_at: i64,
        reset_password_at: i64,
    },
    /// A successful user-led identity re-proof.
    IdentityReprove {
        state: AccountState,
        updated_at: i64,
        reproved_identity_at: i64,
    },
}

impl RecordPatch {
    /// The state this patch writes.
    pub fn state(&self) -> &AccountState {
        match self {
            RecordPatch::Intervention { state, .. }
            | RecordPatch::PasswordReset { state, .. }
            | RecordPatch::IdentityReprove { state, .. } => state,
        }
    }

    /// Canonical patch semantics: the field set each variant applies.
    /// Store adapters either call this on a loaded record or translate the
    /// same field set into their native partial-update syntax.
    pub fn apply_to(&self, record: &mut PersistedAccountRecord) {
        match self {
            RecordPatch::Intervention {
                state,
                updated_at,
                intervention_name,
                sent_at,
                applied_at,
                history_entry,
            } => {
                record.state = *state;
                record.updated_at = *updated_at;
                record.intervention_name = Some(intervention_name.clone());
                record.sent_at = Some(*sent_at);
                record.applied_at = Some(*applied_at);
                record.history.push(history_entry.clone());
            }
            RecordPatch::PasswordReset { state, updated_at, reset_password_at } => {
                record.state = *state;
                record.updated_at = *updated_at;
                record.reset_password_at = Some(*reset_password_at);
            }
            RecordPatch::IdentityReprove { state, updated_at, reproved_identity_at } => {
                record.state = *state;
                record.updated_at = *updated_at;
                record.reproved_identity_at = Some(*reproved_identity_at);
            }
        }
    }
}

/// Optimistic condition attached to a write, taken from the read snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Write unconditionally.
    Unconditional,
    /// Fail the write unless `applied_at` still has the given value
    /// (`None` when the read found no record or no applied timestamp).
    AppliedAtUnchanged(Option<i64>),
}
