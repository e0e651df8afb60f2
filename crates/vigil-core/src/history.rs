//! Compact audit-trail encoding.
//!
//! Each applied intervention appends one entry to the stored record's
//! history: seven fields joined by a single delimiter, with optional
//! trailing fields encoded as empty strings. The field count is fixed so
//! entries stay mechanically splittable; the stored intervention code is
//! resolved back to its canonical name at decode time for display.

use thiserror::Error;

use crate::effects::clock::Timestamp;
use crate::event::IngressEvent;
use crate::graph::TransitionGraph;

/// Field separator. Never appears inside field values produced by upstream
/// components.
pub const DELIMITER: char = '|';

/// Fixed number of fields per entry.
pub const FIELD_COUNT: usize = 7;

/// One decoded history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// When this system applied the intervention, epoch millis.
    pub applied_at_ms: i64,
    /// Component that published the source event.
    pub component_id: String,
    /// Numeric intervention code as stored.
    pub intervention_code: String,
    /// Reason recorded with the intervention.
    pub intervention_reason: String,
    /// Component the intervention originated from, when recorded.
    pub originating_component_id: Option<String>,
    /// Code of the superseded intervention, when recorded.
    pub predecessor_id: Option<String>,
    /// Requesting analyst or system, when recorded.
    pub requester_id: Option<String>,
    /// Canonical intervention name resolved from the current graph; `None`
    /// when the stored code no longer maps to an edge.
    pub intervention_name: Option<String>,
}

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// The source event carries no intervention extension; user-led actions
    /// have no history entry.
    #[error("event carries no intervention data")]
    MissingInterventionData,
    /// Splitting did not yield exactly [`FIELD_COUNT`] fields.
    #[error("history entry has {found} fields, expected {FIELD_COUNT}")]
    MalformedHistoryString { found: usize },
    /// One of the four mandatory fields is empty.
    #[error("history entry missing required field `{field}`")]
    MissingRequiredField { field: &'static str },
    /// The stored timestamp is not numeric.
    #[error("history entry timestamp `{0}` is not numeric")]
    InvalidTimestamp(String),
}

/// Encode one entry for an applied intervention.
pub fn encode(event: &IngressEvent, applied_at: &Timestamp) -> Result<String, HistoryError> {
    let intervention = event
        .extensions
        .intervention
        .as_ref()
        .ok_or(HistoryError::MissingInterventionData)?;

    let applied = applied_at.millis.to_string();
    let fields: [&str; FIELD_COUNT] = [
        &applied,
        &event.component_id,
        &intervention.intervention_code,
        &intervention.intervention_reason,
        intervention.originating_component_id.as_deref().unwrap_or(""),
        intervention.intervention_predecessor_id.as_deref().unwrap_or(""),
        intervention.requester_id.as_deref().unwrap_or(""),
    ];
    Ok(fields.join(&DELIMITER.to_string()))
}

/// Decode one stored entry, resolving the code against the current graph.
pub fn decode(raw: &str, graph: &TransitionGraph) -> Result<HistoryEntry, HistoryError> {
    let fields: Vec<&str> = raw.split(DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(HistoryError::MalformedHistoryString { found: fields.len() });
    }

    let required = |index: usize, field: &'static str| -> Result<&str, HistoryError> {
        let value = fields[index];
        if value.is_empty() {
            Err(HistoryError::MissingRequiredField { field })
        } else {
            Ok(value)
        }
    };
    let optional = |index: usize| -> Option<String> {
        let value = fields[index];
        (!value.is_empty()).then(|| value.to_string())
    };

    let raw_timestamp = required(0, "applied_at")?;
    let applied_at_ms = raw_timestamp
        .parse::<i64>()
        .map_err(|_| HistoryError::InvalidTimestamp(raw_timestamp.to_string()))?;
    let component_id = required(1, "component_id")?.to_string();
    let intervention_code = required(2, "intervention_code")?.to_string();
    let intervention_reason = required(3, "intervention_reason")?.to_string();

    let intervention_name = graph
        .intervention_name_for_code(&intervention_code)
        .map(str::to_string);

    Ok(HistoryEntry {
        applied_at_ms,
        component_id,
        intervention_code,
        intervention_reason,
        originating_component_id: optional(4),
        predecessor_id: optional(5),
        requester_id: optional(6),
        intervention_name,
    })
}
