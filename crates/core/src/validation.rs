use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};

/// Outcome of the optional decision validation overlay, disabled by
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    Approved,
    Blocked,
}

/// The validators that may have participated in producing a
/// [`ValidationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Local,
    ExternalA,
    ExternalB,
}

/// Record of an advisory (or, if promoted, blocking) second opinion on a
/// decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ValidationRecord {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub validation_id: Uuid,
    pub decision_id: Uuid,
    pub result: ValidationResult,
    pub confidence: f64,
    pub critique: String,
    pub validators_used: Vec<ValidatorKind>,
    pub safety_veto_triggered: bool,
}

impl ValidationRecord {
    pub fn new(
        source: impl Into<String>,
        decision_id: Uuid,
        result: ValidationResult,
        confidence: f64,
        critique: impl Into<String>,
        validators_used: Vec<ValidatorKind>,
        safety_veto_triggered: bool,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            validation_id: new_id(),
            decision_id,
            result,
            confidence: confidence.clamp(0.0, 1.0),
            critique: critique.into(),
            validators_used,
            safety_veto_triggered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_into_unit_interval() {
        let record = ValidationRecord::new(
            "orion-decider",
            new_id(),
            ValidationResult::Blocked,
            1.5,
            "exceeded blast radius",
            vec![ValidatorKind::Local],
            true,
        );
        assert_eq!(record.confidence, 1.0);
    }
}
