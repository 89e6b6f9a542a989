//! InitiatePurchaseHandler - Command handler that opens a pending grant.
//!
//! The grant stays `pending` until the payment provider confirms the
//! transaction identified by `external_payment_ref`.

use std::sync::Arc;

use tracing::info;

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{PlanId, Timestamp, UserId};
use crate::domain::grant::Grant;
use crate::ports::{GrantRepository, PlanCatalog};

/// Command to start a purchase of a catalog plan.
#[derive(Debug, Clone)]
pub struct InitiatePurchaseCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub external_payment_ref: Option<String>,
}

/// Result of a purchase initiation.
#[derive(Debug, Clone)]
pub struct InitiatePurchaseResult {
    pub grant: Grant,
}

pub struct InitiatePurchaseHandler {
    catalog: Arc<dyn PlanCatalog>,
    grants: Arc<dyn GrantRepository>,
}

impl InitiatePurchaseHandler {
    pub fn new(catalog: Arc<dyn PlanCatalog>, grants: Arc<dyn GrantRepository>) -> Self {
        Self { catalog, grants }
    }

    /// # Errors
    ///
    /// - `PlanNotFound` if the plan does not exist
    /// - `ValidationFailed` if the plan is retired or the reference is blank
    /// - `DuplicatePaymentReference` if the reference is already in use
    pub async fn handle(
        &self,
        cmd: InitiatePurchaseCommand,
    ) -> Result<InitiatePurchaseResult, EntitlementError> {
        let plan = self
            .catalog
            .find_by_id(&cmd.plan_id)
            .await?
            .ok_or_else(|| EntitlementError::plan_not_found(cmd.plan_id.to_string()))?;

        let grant = Grant::issue(&plan, cmd.user_id, cmd.external_payment_ref, Timestamp::now())?;
        self.grants.save(&grant).await?;

        info!(
            user_id = %grant.user_id,
            grant_id = %grant.id,
            plan = %plan.name,
            kind = %grant.kind(),
            "Pending grant created"
        );

        Ok(InitiatePurchaseResult { grant })
    }
}
