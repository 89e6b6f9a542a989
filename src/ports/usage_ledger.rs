//! Usage ledger port - the only writer of usage counters.
//!
//! Every method is a single compare-and-swap against storage: the check and
//! the write happen in one statement (or one transaction), never as a
//! read in application memory followed by a write-back.

use async_trait::async_trait;

use crate::domain::catalog::PlanKind;
use crate::domain::foundation::{DomainError, GrantId, Timestamp};
use crate::domain::lifecycle::ResetBoundary;

/// Result of a reset request for one boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// First invocation for this boundary; counters were cleared.
    Applied { grants_reset: u64 },
    /// This boundary was already applied; nothing changed.
    AlreadyApplied,
}

/// Atomic counter operations on grants.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Debit one unit from a grant if, at the moment of the write, it is
    /// live and has capacity.
    ///
    /// Subscriptions increment both weekly and monthly counters guarded by
    /// both limits; packages increment `used_credits` guarded by the total.
    /// Returns false when the guard matched nothing; nothing changes then.
    async fn try_debit(
        &self,
        grant_id: &GrantId,
        kind: PlanKind,
        now: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Mark every active grant with `expired_at <= now` as expired.
    ///
    /// Returns the ids that changed. Usage counters are left untouched.
    async fn expire_due(&self, now: Timestamp) -> Result<Vec<GrantId>, DomainError>;

    /// Zero the window's counter on every active subscription, at most once
    /// per boundary. Packages are never touched.
    async fn reset_usage(&self, boundary: &ResetBoundary) -> Result<ResetOutcome, DomainError>;
}
