//! Account restriction state.

use serde::{Deserialize, Serialize};

/// The four restriction flags that together describe an account's standing.
///
/// Only the six combinations enumerated by the transition graph are legal;
/// any other combination indicates corrupt data or an out-of-date graph and
/// is surfaced as a configuration error by the state engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Account is permanently suspended and only an unblock can revive it.
    pub blocked: bool,
    /// Account is suspended, possibly pending a user-led remediation.
    pub suspended: bool,
    /// User must complete a password reset to lift the suspension.
    pub reset_password: bool,
    /// User must re-prove their identity to lift the suspension.
    pub reprove_identity: bool,
}

impl AccountState {
    /// The unrestricted state every account starts in.
    pub const OKAY: AccountState = AccountState {
        blocked: false,
        suspended: false,
        reset_password: false,
        reprove_identity: false,
    };

    /// True when any restriction flag is set.
    pub fn is_restricted(&self) -> bool {
        self.blocked || self.suspended || self.reset_password || self.reprove_identity
    }
}
