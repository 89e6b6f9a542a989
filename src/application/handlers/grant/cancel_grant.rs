//! CancelGrantHandler - Command handler for explicit cancellation.

use std::sync::Arc;

use tracing::info;

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{GrantId, Timestamp, UserId};
use crate::domain::grant::{Grant, GrantStatus};
use crate::ports::GrantRepository;

/// Command to cancel one of the user's grants.
#[derive(Debug, Clone)]
pub struct CancelGrantCommand {
    pub user_id: UserId,
    pub grant_id: GrantId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelGrantResult {
    pub grant_id: GrantId,
    /// True when the grant was already cancelled and nothing changed.
    pub already_cancelled: bool,
}

pub struct CancelGrantHandler {
    grants: Arc<dyn GrantRepository>,
}

impl CancelGrantHandler {
    pub fn new(grants: Arc<dyn GrantRepository>) -> Self {
        Self { grants }
    }

    /// # Errors
    ///
    /// - `GrantNotFound` if the grant does not exist or belongs to someone else
    /// - `InvalidState` if the grant has already expired
    pub async fn handle(&self, cmd: CancelGrantCommand) -> Result<CancelGrantResult, EntitlementError> {
        let grant = self.load_owned(&cmd).await?;
        let now = Timestamp::now();

        // Validates the transition; the guarded write below is authoritative.
        let mut target = grant.clone();
        if !target.cancel(now)? {
            return Ok(CancelGrantResult {
                grant_id: grant.id,
                already_cancelled: true,
            });
        }

        let changed = self
            .grants
            .mark_status(
                &grant.id,
                &[GrantStatus::Pending, GrantStatus::Active],
                GrantStatus::Cancelled,
                now,
            )
            .await?;

        if !changed {
            // Someone moved the grant between our read and our write.
            let current = self.load_owned(&cmd).await?;
            return match current.status {
                GrantStatus::Cancelled => Ok(CancelGrantResult {
                    grant_id: current.id,
                    already_cancelled: true,
                }),
                status => Err(EntitlementError::invalid_state(status.as_str(), "cancel")),
            };
        }

        info!(user_id = %cmd.user_id, grant_id = %grant.id, "Grant cancelled");

        Ok(CancelGrantResult {
            grant_id: grant.id,
            already_cancelled: false,
        })
    }

    async fn load_owned(&self, cmd: &CancelGrantCommand) -> Result<Grant, EntitlementError> {
        self.grants
            .find_by_id(&cmd.grant_id)
            .await?
            .filter(|g| g.user_id == cmd.user_id)
            .ok_or(EntitlementError::GrantNotFound(cmd.grant_id))
    }
}
