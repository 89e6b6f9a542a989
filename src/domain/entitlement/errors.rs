//! Entitlement-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | InvalidPlanConfiguration | 500 |
//! | NoActiveGrant | 402 |
//! | LimitReached | 402 |
//! | CreditsExhausted | 402 |
//! | InsufficientEntitlement | 402 |
//! | UnknownPaymentReference | 404 (retryable) |
//! | ConcurrencyConflict | 409 |
//! | PlanNotFound / GrantNotFound | 404 |
//! | DuplicatePaymentReference | 409 |
//! | InvalidState | 409 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, GrantId, PlanId, UserId, ValidationError};

/// Errors raised by the entitlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementError {
    /// Catalog data is inconsistent (kind/field mismatch, bad price, bad metadata).
    #[error("Plan '{plan}' is misconfigured: {reason}")]
    InvalidPlanConfiguration { plan: String, reason: String },

    /// User has neither an eligible subscription nor an eligible package.
    #[error("User {0} has no active subscription or credit package")]
    NoActiveGrant(UserId),

    /// Active subscription exists but its weekly or monthly quota is used up.
    #[error("Publishing limit reached for user {0}")]
    LimitReached(UserId),

    /// Only packages exist and every one of them is used up.
    #[error("All credit packages are exhausted for user {0}")]
    CreditsExhausted(UserId),

    /// No candidate grant survived the guarded debit.
    #[error("Insufficient entitlement to publish for user {0}")]
    InsufficientEntitlement(UserId),

    /// A payment event references a grant this engine does not know (yet).
    #[error("No grant matches payment reference '{0}'")]
    UnknownPaymentReference(String),

    /// A guarded update matched zero rows because another writer won.
    #[error("Concurrent update lost on grant {0}")]
    ConcurrencyConflict(GrantId),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Grant not found: {0}")]
    GrantNotFound(GrantId),

    #[error("Payment reference '{0}' is already attached to a grant")]
    DuplicatePaymentReference(String),

    #[error("Cannot {attempted} grant in {current} state")]
    InvalidState { current: String, attempted: String },

    #[error("Validation failed for '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    #[error("Error: {0}")]
    Infrastructure(String),
}

impl EntitlementError {
    pub fn invalid_plan(plan: impl Into<String>, reason: impl Into<String>) -> Self {
        EntitlementError::InvalidPlanConfiguration {
            plan: plan.into(),
            reason: reason.into(),
        }
    }

    pub fn plan_not_found(plan: impl Into<String>) -> Self {
        EntitlementError::PlanNotFound(plan.into())
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        EntitlementError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EntitlementError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        EntitlementError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EntitlementError::InvalidPlanConfiguration { .. } => ErrorCode::InvalidPlanConfiguration,
            EntitlementError::NoActiveGrant(_) => ErrorCode::NoActiveGrant,
            EntitlementError::LimitReached(_) => ErrorCode::LimitReached,
            EntitlementError::CreditsExhausted(_) => ErrorCode::CreditsExhausted,
            EntitlementError::InsufficientEntitlement(_) => ErrorCode::InsufficientEntitlement,
            EntitlementError::UnknownPaymentReference(_) => ErrorCode::UnknownPaymentReference,
            EntitlementError::ConcurrencyConflict(_) => ErrorCode::ConcurrencyConflict,
            EntitlementError::PlanNotFound(_) => ErrorCode::PlanNotFound,
            EntitlementError::GrantNotFound(_) => ErrorCode::GrantNotFound,
            EntitlementError::DuplicatePaymentReference(_) => ErrorCode::DuplicatePaymentReference,
            EntitlementError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            EntitlementError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            EntitlementError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns true if the caller (or delivery mechanism) should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EntitlementError::UnknownPaymentReference(_)
                | EntitlementError::ConcurrencyConflict(_)
                | EntitlementError::Infrastructure(_)
        )
    }

    /// Returns true if this is a user-facing publishing restriction.
    pub fn is_restriction(&self) -> bool {
        matches!(
            self,
            EntitlementError::NoActiveGrant(_)
                | EntitlementError::LimitReached(_)
                | EntitlementError::CreditsExhausted(_)
                | EntitlementError::InsufficientEntitlement(_)
        )
    }
}

impl From<DomainError> for EntitlementError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::InvalidPlanConfiguration => EntitlementError::InvalidPlanConfiguration {
                plan: err
                    .details
                    .get("plan")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                reason: err.message,
            },
            ErrorCode::DuplicatePaymentReference => EntitlementError::DuplicatePaymentReference(
                err.details
                    .get("external_payment_ref")
                    .cloned()
                    .unwrap_or(err.message),
            ),
            ErrorCode::ValidationFailed => EntitlementError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => EntitlementError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for EntitlementError {
    fn from(err: ValidationError) -> Self {
        DomainError::from(err).into()
    }
}

impl From<EntitlementError> for DomainError {
    fn from(err: EntitlementError) -> Self {
        let code = err.code();
        match err {
            EntitlementError::InvalidPlanConfiguration { plan, reason } => {
                DomainError::new(code, reason).with_detail("plan", plan)
            }
            EntitlementError::DuplicatePaymentReference(ref reference) => {
                let reference = reference.clone();
                DomainError::new(code, err.to_string()).with_detail("external_payment_ref", reference)
            }
            EntitlementError::ValidationFailed { field, message } => {
                DomainError::new(code, message).with_detail("field", field)
            }
            other => DomainError::new(code, other.to_string()),
        }
    }
}
