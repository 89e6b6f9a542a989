//! Grant repository port.
//!
//! Persists grants and answers the finders the entitlement policy needs.
//!
//! # Liveness
//!
//! The "active" finders return only grants with `status = active` whose
//! `expired_at` is unset or later than `now`. A grant past its expiry is
//! never returned even if the expiry sweep has not run yet.
//!
//! # Usage counters
//!
//! This port never writes usage counters. Debits and resets go through
//! [`UsageLedger`](super::UsageLedger) so every counter write is a guarded
//! update.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, GrantId, Timestamp, UserId};
use crate::domain::grant::{Grant, GrantStatus};

/// Result of a guarded activation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationOutcome {
    /// False if the grant was no longer pending (another delivery won).
    pub activated: bool,
    /// Subscriptions of the same user cancelled to keep one active.
    pub superseded: Vec<GrantId>,
}

/// Repository port for grant persistence and lookup.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Insert a newly issued grant.
    ///
    /// # Errors
    ///
    /// - `DuplicatePaymentReference` if another grant carries the same
    ///   `external_payment_ref`
    /// - `DatabaseError` on persistence failure
    async fn save(&self, grant: &Grant) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &GrantId) -> Result<Option<Grant>, DomainError>;

    async fn find_by_external_payment_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Grant>, DomainError>;

    /// The user's live subscription, if any (at most one).
    async fn active_subscription_for(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<Option<Grant>, DomainError>;

    /// The user's live packages, oldest-created first.
    async fn active_packages_for(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<Vec<Grant>, DomainError>;

    /// Every grant the user owns, oldest-created first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Grant>, DomainError>;

    /// Persist an activation, guarded on the stored row still being pending.
    ///
    /// `grant` carries the already-activated state (status, `started_at`,
    /// `expired_at`). For subscriptions, any other active subscription of
    /// the same user is cancelled in the same transaction.
    async fn activate(&self, grant: &Grant) -> Result<ActivationOutcome, DomainError>;

    /// Move a grant to `to` if its stored status is one of `from`.
    ///
    /// Returns false when the guard matched nothing. Never touches usage.
    async fn mark_status(
        &self,
        id: &GrantId,
        from: &[GrantStatus],
        to: GrantStatus,
        at: Timestamp,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn GrantRepository) {}
    }
}
