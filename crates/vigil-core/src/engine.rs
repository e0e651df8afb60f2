//! Pure transition decisions over the validated graph.
//!
//! The engine never touches storage, time, or the network; given a current
//! state and an event it either returns the resulting state with its audit
//! metadata or rejects the transition. Rejection is an expected outcome the
//! caller audits and drops; configuration errors are not — they mean the
//! graph and the data disagree and must be surfaced loudly.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::event::EventName;
use crate::graph::{TransitionCode, TransitionGraph};
use crate::state::AccountState;

/// Result of one applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// The state the account moves to.
    pub new_state: AccountState,
    /// Canonical name of the applied intervention; `None` on user-led edges.
    pub intervention_name: Option<String>,
    /// Codes leaving the new state.
    pub next_allowable_interventions: Vec<TransitionCode>,
}

/// Engine failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The graph defines no edge for this event from the current state.
    /// Carries the unchanged state so the caller can audit the rejection.
    #[error("no transition for {event} from `{from}`")]
    Rejected {
        event: EventName,
        from: String,
        current: AccountState,
    },
    /// The graph and the observed data disagree; fatal, never caught per
    /// message.
    #[error("transition graph misconfiguration: {0}")]
    Configuration(String),
}

/// Decision engine over a shared read-only transition graph.
#[derive(Debug, Clone)]
pub struct StateEngine {
    graph: Arc<TransitionGraph>,
}

impl StateEngine {
    pub fn new(graph: Arc<TransitionGraph>) -> Self {
        StateEngine { graph }
    }

    /// The graph this engine decides against.
    pub fn graph(&self) -> &TransitionGraph {
        &self.graph
    }

    /// Decide the transition for `event` from `current`.
    ///
    /// An absent `current` means the account has no stored record yet and
    /// defaults to the unrestricted state.
    pub fn apply_transition(
        &self,
        event: EventName,
        current: Option<&AccountState>,
    ) -> Result<EngineOutput, EngineError> {
        let current = current.copied().unwrap_or(AccountState::OKAY);

        let from = self.graph.name_of(&current).ok_or_else(|| {
            EngineError::Configuration(format!("account state {current:?} matches no graph node"))
        })?;

        let codes = self
            .graph
            .adjacent(from)
            .filter(|codes| !codes.is_empty())
            .ok_or_else(|| {
                EngineError::Configuration(format!("node `{from}` has no outgoing transitions"))
            })?;

        let code = codes
            .iter()
            .find(|code| self.graph.edge(code).map(|edge| edge.event) == Some(event))
            .ok_or_else(|| EngineError::Rejected {
                event,
                from: from.to_string(),
                current,
            })?;

        let edge = self
            .graph
            .edge(code)
            .ok_or_else(|| EngineError::Configuration(format!("edge `{code}` vanished from graph")))?;
        let new_state = *self.graph.node(&edge.to).ok_or_else(|| {
            EngineError::Configuration(format!("edge `{code}` points at unknown node `{}`", edge.to))
        })?;
        if new_state == current {
            return Err(EngineError::Configuration(format!(
                "edge `{code}` from `{from}` does not change state"
            )));
        }

        let next_allowable = self
            .graph
            .adjacent(&edge.to)
            .map(<[TransitionCode]>::to_vec)
            .unwrap_or_default();

        debug!(%event, from, to = %edge.to, code = %code, "transition applied");

        Ok(EngineOutput {
            new_state,
            intervention_name: edge.intervention_name.clone(),
            next_allowable_interventions: next_allowable,
        })
    }

    /// Map a numeric wire code to its canonical event name.
    ///
    /// Codes are part of the fixed contract, so an unknown code is a
    /// configuration error rather than bad data.
    pub fn event_for_code(&self, code: &str) -> Result<EventName, EngineError> {
        self.graph.event_for_code(code).ok_or_else(|| {
            EngineError::Configuration(format!("intervention code `{code}` has no edge"))
        })
    }
}
