//! ExpireSweepHandler - Moves lapsed active grants to `expired`.

use std::sync::Arc;

use tracing::info;

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{GrantId, Timestamp};
use crate::ports::UsageLedger;

#[derive(Debug, Clone, Copy)]
pub struct ExpireSweepCommand {
    pub now: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpireSweepResult {
    pub expired: Vec<GrantId>,
}

/// Safe to re-run: a second sweep at the same instant finds nothing.
pub struct ExpireSweepHandler {
    ledger: Arc<dyn UsageLedger>,
}

impl ExpireSweepHandler {
    pub fn new(ledger: Arc<dyn UsageLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, cmd: ExpireSweepCommand) -> Result<ExpireSweepResult, EntitlementError> {
        let expired = self.ledger.expire_due(cmd.now).await?;
        info!(job = "expire-sweep", expired = expired.len(), "Expire sweep finished");
        Ok(ExpireSweepResult { expired })
    }
}
