//! ResetUsageHandler - Clears one usage window on active subscriptions.
//!
//! Each invocation resolves the boundary its instant belongs to; the ledger
//! applies each boundary at most once.

use std::sync::Arc;

use tracing::info;

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::Timestamp;
use crate::domain::lifecycle::{ResetBoundary, ResetSchedule, UsageWindow};
use crate::ports::{ResetOutcome, UsageLedger};

#[derive(Debug, Clone, Copy)]
pub struct ResetUsageCommand {
    pub window: UsageWindow,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetUsageResult {
    pub boundary: ResetBoundary,
    pub outcome: ResetOutcome,
}

pub struct ResetUsageHandler {
    ledger: Arc<dyn UsageLedger>,
    schedule: ResetSchedule,
}

impl ResetUsageHandler {
    pub fn new(ledger: Arc<dyn UsageLedger>, schedule: ResetSchedule) -> Self {
        Self { ledger, schedule }
    }

    pub fn schedule(&self) -> &ResetSchedule {
        &self.schedule
    }

    pub async fn handle(&self, cmd: ResetUsageCommand) -> Result<ResetUsageResult, EntitlementError> {
        let boundary = self.schedule.boundary_for(cmd.window, cmd.at);
        let outcome = self.ledger.reset_usage(&boundary).await?;

        match outcome {
            ResetOutcome::Applied { grants_reset } => info!(
                job = cmd.window.job_name(),
                boundary = %boundary.key,
                grants_reset,
                "Usage reset applied"
            ),
            ResetOutcome::AlreadyApplied => info!(
                job = cmd.window.job_name(),
                boundary = %boundary.key,
                "Usage reset already applied for boundary"
            ),
        }

        Ok(ResetUsageResult { boundary, outcome })
    }
}
