//! ConsumeEntitlementHandler - Command handler that debits one publish.
//!
//! Candidates come from the policy's debit order. Each is tried with a
//! guarded debit; a miss means another consumer got there first (or the
//! grant lapsed), so the next candidate is tried. Nothing is written unless
//! a guard matches, so a failed call leaves every counter as it was.

use std::sync::Arc;

use tracing::{debug, info};

use super::snapshot::load_snapshot;
use crate::domain::catalog::PlanKind;
use crate::domain::entitlement::{debit_order, EntitlementError};
use crate::domain::foundation::{GrantId, Timestamp, UserId};
use crate::ports::{GrantRepository, UsageLedger};

/// Command to consume one publishing entitlement.
#[derive(Debug, Clone)]
pub struct ConsumeEntitlementCommand {
    pub user_id: UserId,
}

/// The grant that was actually debited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeEntitlementResult {
    pub grant_id: GrantId,
    pub kind: PlanKind,
}

/// Handler for atomically debiting a user's entitlement.
pub struct ConsumeEntitlementHandler {
    grants: Arc<dyn GrantRepository>,
    ledger: Arc<dyn UsageLedger>,
}

impl ConsumeEntitlementHandler {
    pub fn new(grants: Arc<dyn GrantRepository>, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { grants, ledger }
    }

    /// # Errors
    ///
    /// - `InsufficientEntitlement` if no candidate survives its guarded debit
    /// - `Infrastructure` on storage failure
    pub async fn handle(
        &self,
        cmd: ConsumeEntitlementCommand,
    ) -> Result<ConsumeEntitlementResult, EntitlementError> {
        let now = Timestamp::now();
        let snapshot = load_snapshot(self.grants.as_ref(), &cmd.user_id, now, false).await?;

        for candidate in debit_order(&snapshot, now) {
            if self
                .ledger
                .try_debit(&candidate.grant_id, candidate.kind, now)
                .await?
            {
                info!(
                    user_id = %cmd.user_id,
                    grant_id = %candidate.grant_id,
                    kind = %candidate.kind,
                    "Entitlement consumed"
                );
                return Ok(ConsumeEntitlementResult {
                    grant_id: candidate.grant_id,
                    kind: candidate.kind,
                });
            }

            let conflict = EntitlementError::ConcurrencyConflict(candidate.grant_id);
            debug!(
                user_id = %cmd.user_id,
                grant_id = %candidate.grant_id,
                error = %conflict,
                "Guarded debit matched nothing, trying next candidate"
            );
        }

        Err(EntitlementError::InsufficientEntitlement(cmd.user_id))
    }
}
