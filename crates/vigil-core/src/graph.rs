//! Transition graph: the validated configuration of states, edges, and
//! adjacency that the state engine decides against.
//!
//! The graph is an explicitly constructed immutable value. Validation runs
//! once, inside [`TransitionGraph::new`], and a failure there must abort
//! start-up; it is never caught per message. The code-to-event mapping the
//! edges carry is part of the wire contract and must remain stable across
//! deployments: reusing a code with a different meaning breaks every stored
//! history entry in flight.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::EventName;
use crate::state::AccountState;

/// Identifier of one edge in the transition graph.
///
/// Fraud interventions carry these numerically on the wire (`"01"`..`"07"`);
/// user-led edges use codes that never appear on the wire and carry no
/// intervention name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionCode(String);

impl TransitionCode {
    pub fn new(code: impl Into<String>) -> Self {
        TransitionCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransitionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransitionCode {
    fn from(code: &str) -> Self {
        TransitionCode(code.to_string())
    }
}

/// One edge: the event that triggers it, where it lands, and the
/// intervention name recorded when it is applied (absent on user-led edges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEdge {
    /// Destination node name.
    pub to: String,
    /// Event that triggers this edge.
    pub event: EventName,
    /// Canonical intervention name; `None` on user-led edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention_name: Option<String>,
}

/// Ways a graph can fail eager validation. All are fatal at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node `{0}` has no adjacency entry")]
    MissingAdjacency(String),
    #[error("adjacency entry `{0}` does not name a node")]
    UnknownAdjacencyNode(String),
    #[error("edge `{code}` points at unknown node `{to}`")]
    UnknownDestination { code: TransitionCode, to: String },
    #[error("adjacency of `{node}` references unknown edge `{code}`")]
    UnknownEdge { node: String, code: TransitionCode },
    #[error("edge `{code}` reachable from `{node}` does not change state")]
    SelfTransition { node: String, code: TransitionCode },
    #[error("adjacency of `{node}` carries event {event} on more than one edge")]
    AmbiguousEvent { node: String, event: EventName },
    #[error("fraud edge `{code}` carries no intervention name")]
    MissingInterventionName { code: TransitionCode },
    #[error("two nodes share the same state: `{first}` and `{second}`")]
    DuplicateNodeState { first: String, second: String },
}

/// The validated transition graph.
///
/// Three maps: node name to state, transition code to edge, node name to the
/// codes leaving it. Constructed once at start-up and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionGraph {
    nodes: BTreeMap<String, AccountState>,
    edges: BTreeMap<TransitionCode, TransitionEdge>,
    adjacency: BTreeMap<String, Vec<TransitionCode>>,
}

impl TransitionGraph {
    /// Build a graph from its three maps, validating eagerly.
    pub fn new(
        nodes: BTreeMap<String, AccountState>,
        edges: BTreeMap<TransitionCode, TransitionEdge>,
        adjacency: BTreeMap<String, Vec<TransitionCode>>,
    ) -> Result<Self, GraphError> {
        let graph = TransitionGraph { nodes, edges, adjacency };
        graph.validate()?;
        Ok(graph)
    }

    /// The built-in production table.
    pub fn builtin() -> Result<Self, GraphError> {
        let mut nodes = BTreeMap::new();
        nodes.insert("okay".to_string(), AccountState::OKAY);
        nodes.insert(
            "suspended".to_string(),
            AccountState { suspended: true, ..AccountState::OKAY },
        );
        nodes.insert(
            "blocked".to_string(),
            AccountState { blocked: true, ..AccountState::OKAY },
        );
        nodes.insert(
            "password-reset".to_string(),
            AccountState { suspended: true, reset_password: true, ..AccountState::OKAY },
        );
        nodes.insert(
            "identity-reprove".to_string(),
            AccountState { suspended: true, reprove_identity: true, ..AccountState::OKAY },
        );
        nodes.insert(
            "password-and-identity".to_string(),
            AccountState {
                suspended: true,
                reset_password: true,
                reprove_identity: true,
                ..AccountState::OKAY
            },
        );

        let mut edges = BTreeMap::new();
        let mut edge = |code: &str, to: &str, event: EventName, name: Option<&str>| {
            edges.insert(
                TransitionCode::from(code),
                TransitionEdge {
                    to: to.to_string(),
                    event,
                    intervention_name: name.map(str::to_string),
                },
            );
        };
        edge("01", "suspended", EventName::FraudSuspendAccount, Some("ACCOUNT_SUSPENDED"));
        edge("02", "okay", EventName::FraudUnsuspendAccount, Some("ACCOUNT_UNSUSPENDED"));
        edge("03", "blocked", EventName::FraudBlockAccount, Some("ACCOUNT_BLOCKED"));
        edge(
            "04",
            "password-reset",
            EventName::FraudForcedUserPasswordReset,
            Some("FORCED_USER_PASSWORD_RESET"),
        );
        edge(
            "05",
            "identity-reprove",
            EventName::FraudForcedUserIdentityReprove,
            Some("FORCED_USER_IDENTITY_REPROVE"),
        );
        edge(
            "06",
            "password-and-identity",
            EventName::FraudForcedUserPasswordResetAndIdentityReprove,
            Some("FORCED_USER_PASSWORD_RESET_AND_IDENTITY_REPROVE"),
        );
        edge("07", "okay", EventName::FraudUnblockAccount, Some("ACCOUNT_UNBLOCKED"));
        // User-led edges. The same event appears on several codes so the
        // destination can depend on the origin: clearing one of two
        // outstanding requirements lands on the state with the other intact.
        edge("81", "okay", EventName::AuthPasswordResetSuccessful, None);
        edge("82", "okay", EventName::IpvIdentityIssued, None);
        edge("83", "identity-reprove", EventName::AuthPasswordResetSuccessful, None);
        edge("84", "password-reset", EventName::IpvIdentityIssued, None);

        let mut adjacency = BTreeMap::new();
        let mut adjacent = |node: &str, codes: &[&str]| {
            adjacency.insert(
                node.to_string(),
                codes.iter().map(|c| TransitionCode::from(*c)).collect::<Vec<_>>(),
            );
        };
        adjacent("okay", &["01", "03", "04", "05", "06"]);
        adjacent("suspended", &["02", "03", "04", "05", "06"]);
        adjacent("blocked", &["07"]);
        adjacent("password-reset", &["01", "02", "03", "05", "06", "81"]);
        adjacent("identity-reprove", &["01", "02", "03", "04", "06", "82"]);
        adjacent("password-and-identity", &["01", "02", "03", "04", "05", "83", "84"]);

        Self::new(nodes, edges, adjacency)
    }

    fn validate(&self) -> Result<(), GraphError> {
        for node in self.nodes.keys() {
            if !self.adjacency.contains_key(node) {
                return Err(GraphError::MissingAdjacency(node.clone()));
            }
        }
        for node in self.adjacency.keys() {
            if !self.nodes.contains_key(node) {
                return Err(GraphError::UnknownAdjacencyNode(node.clone()));
            }
        }
        let mut seen_states: BTreeMap<String, &str> = BTreeMap::new();
        for (name, state) in &self.nodes {
            let key = format!(
                "{}{}{}{}",
                state.blocked as u8, state.suspended as u8, state.reset_password as u8,
                state.reprove_identity as u8
            );
            if let Some(first) = seen_states.insert(key, name) {
                return Err(GraphError::DuplicateNodeState {
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }
        for (code, edge) in &self.edges {
            if !self.nodes.contains_key(&edge.to) {
                return Err(GraphError::UnknownDestination {
                    code: code.clone(),
                    to: edge.to.clone(),
                });
            }
            if !edge.event.is_user_led() && edge.intervention_name.is_none() {
                return Err(GraphError::MissingInterventionName { code: code.clone() });
            }
        }
        for (node, codes) in &self.adjacency {
            let mut events_seen: Vec<EventName> = Vec::new();
            for code in codes {
                let edge = self
                    .edges
                    .get(code)
                    .ok_or_else(|| GraphError::UnknownEdge { node: node.clone(), code: code.clone() })?;
                if &edge.to == node {
                    return Err(GraphError::SelfTransition {
                        node: node.clone(),
                        code: code.clone(),
                    });
                }
                if events_seen.contains(&edge.event) {
                    return Err(GraphError::AmbiguousEvent { node: node.clone(), event: edge.event });
                }
                events_seen.push(edge.event);
            }
        }
        Ok(())
    }

    /// State of a named node.
    pub fn node(&self, name: &str) -> Option<&AccountState> {
        self.nodes.get(name)
    }

    /// Name of the node whose state equals `state` field-wise.
    pub fn name_of(&self, state: &AccountState) -> Option<&str> {
        self.nodes
            .iter()
            .find(|(_, node)| *node == state)
            .map(|(name, _)| name.as_str())
    }

    /// Edge for a transition code.
    pub fn edge(&self, code: &TransitionCode) -> Option<&TransitionEdge> {
        self.edges.get(code)
    }

    /// Codes leaving a named node.
    pub fn adjacent(&self, name: &str) -> Option<&[TransitionCode]> {
        self.adjacency.get(name).map(Vec::as_slice)
    }

    /// Canonical event for a wire intervention code.
    pub fn event_for_code(&self, code: &str) -> Option<EventName> {
        self.edges.get(&TransitionCode::from(code)).map(|edge| edge.event)
    }

    /// Intervention name recorded for a code, if the edge carries one.
    pub fn intervention_name_for_code(&self, code: &str) -> Option<&str> {
        self.edges
            .get(&TransitionCode::from(code))
            .and_then(|edge| edge.intervention_name.as_deref())
    }

    /// Intervention name recorded for an event, if any edge triggered by it
    /// carries one.
    pub fn intervention_name_for_event(&self, event: EventName) -> Option<&str> {
        self.edges
            .values()
            .find(|edge| edge.event == event)
            .and_then(|edge| edge.intervention_name.as_deref())
    }
}
