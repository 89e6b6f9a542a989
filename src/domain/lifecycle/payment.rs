//! Settlement events delivered by the payment collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, ValidationError};
use crate::domain::grant::GrantStatus;

/// Outcome reported for an external payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Succeeded => "succeeded",
            PaymentOutcome::Failed => "failed",
            PaymentOutcome::Refunded => "refunded",
        }
    }

    /// Status a grant should end up in after this outcome.
    pub fn target_status(&self) -> GrantStatus {
        match self {
            PaymentOutcome::Succeeded => GrantStatus::Active,
            PaymentOutcome::Failed | PaymentOutcome::Refunded => GrantStatus::Cancelled,
        }
    }
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A settlement event keyed by the provider's transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub external_ref: String,
    pub outcome: PaymentOutcome,
    /// When the provider says the outcome happened.
    pub occurred_at: Timestamp,
}

impl PaymentEvent {
    pub fn new(
        external_ref: impl Into<String>,
        outcome: PaymentOutcome,
        occurred_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let external_ref = external_ref.into();
        if external_ref.trim().is_empty() {
            return Err(ValidationError::empty_field("external_ref"));
        }
        Ok(Self {
            external_ref,
            outcome,
            occurred_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_and_refunds_cancel() {
        assert_eq!(PaymentOutcome::Failed.target_status(), GrantStatus::Cancelled);
        assert_eq!(PaymentOutcome::Refunded.target_status(), GrantStatus::Cancelled);
        assert_eq!(PaymentOutcome::Succeeded.target_status(), GrantStatus::Active);
    }

    #[test]
    fn outcome_deserializes_from_snake_case() {
        let outcome: PaymentOutcome = serde_json::from_str("\"refunded\"").unwrap();
        assert_eq!(outcome, PaymentOutcome::Refunded);
    }

    #[test]
    fn event_requires_reference() {
        assert!(PaymentEvent::new(" ", PaymentOutcome::Succeeded, Timestamp::now()).is_err());
    }
}
