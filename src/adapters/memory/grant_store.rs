//! In-memory grant store.
//!
//! Implements both `GrantRepository` and `UsageLedger` over one mutex, so
//! every guarded operation checks and writes under the same lock, matching
//! the single-statement semantics of the PostgreSQL adapter.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::domain::catalog::PlanKind;
use crate::domain::foundation::{DomainError, ErrorCode, GrantId, Timestamp, UserId};
use crate::domain::grant::{Grant, GrantStatus, GrantUsage};
use crate::domain::lifecycle::{ResetBoundary, UsageWindow};
use crate::ports::{ActivationOutcome, GrantRepository, ResetOutcome, UsageLedger};

#[derive(Default)]
struct State {
    grants: HashMap<GrantId, Grant>,
    /// `(job, boundary key)` pairs already applied.
    applied_resets: HashSet<(String, String)>,
}

/// In-memory implementation of the grant ports.
///
/// Thread-safe via internal `Mutex`. Does not persist across restarts, so it
/// is only suitable for tests and local runs.
#[derive(Default)]
pub struct InMemoryGrantStore {
    state: Mutex<State>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a grant as-is, bypassing the guarded paths.
    ///
    /// Useful for seeding test fixtures in arbitrary states.
    pub fn put(&self, grant: Grant) {
        self.state.lock().unwrap().grants.insert(grant.id, grant);
    }

    /// Returns a snapshot of a stored grant.
    pub fn get(&self, id: &GrantId) -> Option<Grant> {
        self.state.lock().unwrap().grants.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn owned_by<'a>(state: &'a State, user_id: &'a UserId) -> impl Iterator<Item = &'a Grant> {
        state.grants.values().filter(move |g| &g.user_id == user_id)
    }
}

fn oldest_first(mut grants: Vec<Grant>) -> Vec<Grant> {
    grants.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    grants
}

#[async_trait]
impl GrantRepository for InMemoryGrantStore {
    async fn save(&self, grant: &Grant) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();

        if let Some(reference) = &grant.external_payment_ref {
            let taken = state
                .grants
                .values()
                .any(|g| g.id != grant.id && g.external_payment_ref.as_ref() == Some(reference));
            if taken {
                return Err(DomainError::new(
                    ErrorCode::DuplicatePaymentReference,
                    "Payment reference is already attached to a grant",
                )
                .with_detail("external_payment_ref", reference.clone()));
            }
        }

        state.grants.insert(grant.id, grant.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &GrantId) -> Result<Option<Grant>, DomainError> {
        Ok(self.get(id))
    }

    async fn find_by_external_payment_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Grant>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .grants
            .values()
            .find(|g| g.external_payment_ref.as_deref() == Some(external_ref))
            .cloned())
    }

    async fn active_subscription_for(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<Option<Grant>, DomainError> {
        let state = self.state.lock().unwrap();
        let live: Vec<Grant> = Self::owned_by(&state, user_id)
            .filter(|g| g.kind() == PlanKind::Subscription && g.is_live(now))
            .cloned()
            .collect();
        Ok(oldest_first(live).into_iter().next())
    }

    async fn active_packages_for(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<Vec<Grant>, DomainError> {
        let state = self.state.lock().unwrap();
        let live: Vec<Grant> = Self::owned_by(&state, user_id)
            .filter(|g| g.kind() == PlanKind::Package && g.is_live(now))
            .cloned()
            .collect();
        Ok(oldest_first(live))
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Grant>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(oldest_first(Self::owned_by(&state, user_id).cloned().collect()))
    }

    async fn activate(&self, grant: &Grant) -> Result<ActivationOutcome, DomainError> {
        let mut state = self.state.lock().unwrap();

        let pending = matches!(
            state.grants.get(&grant.id).map(|g| g.status),
            Some(GrantStatus::Pending)
        );
        if !pending {
            return Ok(ActivationOutcome::default());
        }

        let mut superseded = Vec::new();
        if grant.kind() == PlanKind::Subscription {
            for other in state.grants.values_mut() {
                if other.id != grant.id
                    && other.user_id == grant.user_id
                    && other.kind() == PlanKind::Subscription
                    && other.status == GrantStatus::Active
                {
                    other.status = GrantStatus::Cancelled;
                    other.updated_at = grant.updated_at;
                    superseded.push(other.id);
                }
            }
        }

        if let Some(stored) = state.grants.get_mut(&grant.id) {
            stored.status = GrantStatus::Active;
            stored.started_at = grant.started_at;
            stored.expired_at = grant.expired_at;
            stored.updated_at = grant.updated_at;
        }

        Ok(ActivationOutcome {
            activated: true,
            superseded,
        })
    }

    async fn mark_status(
        &self,
        id: &GrantId,
        from: &[GrantStatus],
        to: GrantStatus,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().unwrap();
        match state.grants.get_mut(id) {
            Some(grant) if from.contains(&grant.status) => {
                grant.status = to;
                grant.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UsageLedger for InMemoryGrantStore {
    async fn try_debit(
        &self,
        grant_id: &GrantId,
        kind: PlanKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().unwrap();
        let grant = match state.grants.get_mut(grant_id) {
            Some(grant) if grant.kind() == kind && grant.is_live(now) => grant,
            _ => return Ok(false),
        };

        let debited = grant.usage.debit();
        if debited {
            grant.updated_at = now;
        }
        Ok(debited)
    }

    async fn expire_due(&self, now: Timestamp) -> Result<Vec<GrantId>, DomainError> {
        let mut state = self.state.lock().unwrap();
        let mut expired = Vec::new();

        for grant in state.grants.values_mut() {
            let due = grant.status == GrantStatus::Active
                && grant.expired_at.map_or(false, |end| end <= now);
            if due {
                grant.status = GrantStatus::Expired;
                grant.updated_at = now;
                expired.push(grant.id);
            }
        }

        Ok(expired)
    }

    async fn reset_usage(&self, boundary: &ResetBoundary) -> Result<ResetOutcome, DomainError> {
        let mut state = self.state.lock().unwrap();

        let claim = (boundary.window.job_name().to_string(), boundary.key.clone());
        if !state.applied_resets.insert(claim) {
            return Ok(ResetOutcome::AlreadyApplied);
        }

        let mut grants_reset = 0;
        for grant in state.grants.values_mut() {
            if grant.status != GrantStatus::Active {
                continue;
            }
            if let GrantUsage::Subscription(usage) = &mut grant.usage {
                let touched = match boundary.window {
                    UsageWindow::Weekly if usage.weekly_used() > 0 => {
                        usage.reset_weekly();
                        true
                    }
                    UsageWindow::Monthly if usage.monthly_used() > 0 => {
                        usage.reset_monthly();
                        true
                    }
                    _ => false,
                };
                if touched {
                    grants_reset += 1;
                }
            }
        }

        Ok(ResetOutcome::Applied { grants_reset })
    }
}
