//! Field-level validation of inbound events.
//!
//! Two schema branches keyed on event category. The intervention and
//! user-action extension shapes are mutually exclusive; carrying fields from
//! both is a hard error in either direction.

use thiserror::Error;

use crate::event::{EventCategory, IngressEvent};

/// Malformed or ineligible input. Always terminal: a message failing
/// validation will never succeed and must not be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown event name `{0}`")]
    UnknownEventName(String),
    #[error("intervention event missing `{field}`")]
    MissingInterventionField { field: &'static str },
    #[error("intervention event carries user-action fields")]
    UnexpectedUserActionFields,
    #[error("user action event missing `{field}`")]
    MissingUserActionField { field: &'static str },
    #[error("user action event carries an intervention block")]
    UnexpectedInterventionBlock,
    #[error("intervention code `{0}` is not numeric")]
    NonNumericInterventionCode(String),
    #[error("level of confidence `{found}` below required `{required}`")]
    InsufficientConfidence { found: String, required: String },
}

/// Validate the shape of an inbound event against its category's schema.
pub fn validate_event(event: &IngressEvent) -> Result<(), ValidationError> {
    match event.category() {
        EventCategory::FraudIntervention => {
            let intervention = event
                .extensions
                .intervention
                .as_ref()
                .ok_or(ValidationError::MissingInterventionField { field: "intervention" })?;
            if intervention.intervention_code.is_empty() {
                return Err(ValidationError::MissingInterventionField { field: "intervention_code" });
            }
            if intervention.intervention_reason.is_empty() {
                return Err(ValidationError::MissingInterventionField {
                    field: "intervention_reason",
                });
            }
            if event.extensions.has_user_action_fields() {
                return Err(ValidationError::UnexpectedUserActionFields);
            }
            Ok(())
        }
        EventCategory::UserAction => {
            if event.extensions.intervention.is_some() {
                return Err(ValidationError::UnexpectedInterventionBlock);
            }
            if event.extensions.level_of_confidence.is_none() {
                return Err(ValidationError::MissingUserActionField {
                    field: "level_of_confidence",
                });
            }
            if event.extensions.ci_fail.is_none() {
                return Err(ValidationError::MissingUserActionField { field: "ci_fail" });
            }
            if event.extensions.has_mitigations.is_none() {
                return Err(ValidationError::MissingUserActionField { field: "has_mitigations" });
            }
            Ok(())
        }
        EventCategory::Unknown => Err(ValidationError::UnknownEventName(event.event_name.clone())),
    }
}

/// Narrower check for intervention events: the code must parse as an
/// integer. Codes travel as strings, so `"3x"` passes the shape check above
/// but fails here.
pub fn validate_intervention_event(event: &IngressEvent) -> Result<(), ValidationError> {
    validate_event(event)?;
    if let Some(intervention) = event.extensions.intervention.as_ref() {
        if intervention.intervention_code.parse::<u32>().is_err() {
            return Err(ValidationError::NonNumericInterventionCode(
                intervention.intervention_code.clone(),
            ));
        }
    }
    Ok(())
}
