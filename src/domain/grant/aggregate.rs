//! Grant aggregate: a user-owned instance of a catalog plan.
//!
//! # Design Decisions
//!
//! - **Snapshot at purchase**: price, duration and limits are copied from the
//!   plan, so later catalog edits never change what a user bought
//! - **Tagged usage**: the kind of a grant is the variant of its usage, not a
//!   separate field that could disagree with the counters
//! - **Clock is an argument**: every time-dependent method takes `now`

use serde::{Deserialize, Serialize};

use super::{GrantStatus, GrantUsage};
use crate::domain::catalog::{Plan, PlanKind, Price};
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{GrantId, PlanId, StateMachine, Timestamp, UserId};

/// A subscription or credit package owned by exactly one user.
///
/// # Invariants
///
/// - usage counters never exceed their limits
/// - `started_at` and `expired_at` are set together on activation
/// - terminal statuses (`cancelled`, `expired`) are never left
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub user_id: UserId,
    pub plan_id: PlanId,

    /// Price paid, snapshotted from the plan.
    pub price: Price,

    pub status: GrantStatus,
    pub usage: GrantUsage,

    /// Validity length applied when the grant is activated.
    pub duration_days: u32,

    pub started_at: Option<Timestamp>,
    pub expired_at: Option<Timestamp>,

    /// Opaque payment-provider transaction id used for reconciliation.
    pub external_payment_ref: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Grant {
    /// Creates a pending grant for a purchase that has just been initiated.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` if the plan is withdrawn from sale or the
    /// payment reference is blank.
    pub fn issue(
        plan: &Plan,
        user_id: UserId,
        external_payment_ref: Option<String>,
        now: Timestamp,
    ) -> Result<Self, EntitlementError> {
        if !plan.is_active {
            return Err(EntitlementError::validation(
                "plan_id",
                format!("plan '{}' is not available for purchase", plan.name),
            ));
        }

        let external_payment_ref = match external_payment_ref {
            Some(r) if r.trim().is_empty() => {
                return Err(EntitlementError::validation(
                    "external_payment_ref",
                    "payment reference cannot be blank",
                ))
            }
            other => other,
        };

        Ok(Self {
            id: GrantId::new(),
            user_id,
            plan_id: plan.id,
            price: plan.price.clone(),
            status: GrantStatus::Pending,
            usage: GrantUsage::from_terms(&plan.terms),
            duration_days: plan.duration_days,
            started_at: None,
            expired_at: None,
            external_payment_ref,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn kind(&self) -> PlanKind {
        self.usage.kind()
    }

    /// Active and inside its validity window, whether or not the expiry
    /// sweep has caught up yet.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.status == GrantStatus::Active && self.expired_at.map_or(true, |end| end > now)
    }

    /// Live and with capacity left to debit.
    pub fn is_eligible(&self, now: Timestamp) -> bool {
        self.is_live(now) && self.usage.has_capacity()
    }

    /// Was paid for but its window has closed (swept or not).
    pub fn has_lapsed(&self, now: Timestamp) -> bool {
        matches!(self.status, GrantStatus::Active | GrantStatus::Expired)
            && self.expired_at.map_or(false, |end| end <= now)
    }

    /// Activates after confirmed payment, starting the validity window.
    ///
    /// Returns `Ok(false)` if the grant is already active.
    ///
    /// # Errors
    ///
    /// - `InvalidState` for cancelled or expired grants
    /// - `ValidationFailed` if the validity window runs past the calendar
    pub fn activate(&mut self, now: Timestamp) -> Result<bool, EntitlementError> {
        if self.status == GrantStatus::Active {
            return Ok(false);
        }
        let expires_at = now
            .checked_add_days(self.duration_days as i64)
            .ok_or_else(|| {
                EntitlementError::validation("duration_days", "validity window is out of range")
            })?;
        self.transition_to(GrantStatus::Active, "activate")?;
        self.started_at = Some(now);
        self.expired_at = Some(expires_at);
        self.updated_at = now;
        Ok(true)
    }

    /// Cancels the grant. Usage counters are left untouched.
    ///
    /// Returns `Ok(false)` if the grant is already cancelled.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for expired grants.
    pub fn cancel(&mut self, now: Timestamp) -> Result<bool, EntitlementError> {
        if self.status == GrantStatus::Cancelled {
            return Ok(false);
        }
        self.transition_to(GrantStatus::Cancelled, "cancel")?;
        self.updated_at = now;
        Ok(true)
    }

    /// Marks the grant expired. Usage counters are left untouched.
    ///
    /// Returns `Ok(false)` if the grant is already expired.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for cancelled grants.
    pub fn expire(&mut self, now: Timestamp) -> Result<bool, EntitlementError> {
        if self.status == GrantStatus::Expired {
            return Ok(false);
        }
        self.transition_to(GrantStatus::Expired, "expire")?;
        self.updated_at = now;
        Ok(true)
    }

    fn transition_to(&mut self, target: GrantStatus, attempted: &str) -> Result<(), EntitlementError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| EntitlementError::invalid_state(self.status.as_str(), attempted))?;
        Ok(())
    }
}
