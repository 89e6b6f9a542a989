//! EvaluateEntitlementHandler - Query handler for publishing rights.

use std::sync::Arc;

use super::snapshot::load_snapshot;
use crate::domain::entitlement::{evaluate, EntitlementError, PublishingRights};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::GrantRepository;

/// Query for a user's publishing rights.
#[derive(Debug, Clone)]
pub struct EvaluateEntitlementQuery {
    pub user_id: UserId,
}

/// Handler for evaluating whether a user may publish.
///
/// Read-only: safe to call repeatedly and concurrently, outside any
/// transaction.
pub struct EvaluateEntitlementHandler {
    grants: Arc<dyn GrantRepository>,
}

impl EvaluateEntitlementHandler {
    pub fn new(grants: Arc<dyn GrantRepository>) -> Self {
        Self { grants }
    }

    pub async fn handle(
        &self,
        query: EvaluateEntitlementQuery,
    ) -> Result<PublishingRights, EntitlementError> {
        let now = Timestamp::now();
        let snapshot = load_snapshot(self.grants.as_ref(), &query.user_id, now, true).await?;
        Ok(evaluate(&snapshot, now))
    }

    /// Like `handle`, but turns a restriction into its user-facing error.
    ///
    /// # Errors
    ///
    /// - `NoActiveGrant` if nothing live is held (or only lapsed grants)
    /// - `LimitReached` if the subscription's quota is used up
    /// - `CreditsExhausted` if only empty packages are held
    pub async fn require(
        &self,
        query: EvaluateEntitlementQuery,
    ) -> Result<PublishingRights, EntitlementError> {
        let user_id = query.user_id.clone();
        let rights = self.handle(query).await?;
        match rights.restriction_reason {
            Some(reason) => Err(reason.to_error(user_id)),
            None => Ok(rights),
        }
    }
}
