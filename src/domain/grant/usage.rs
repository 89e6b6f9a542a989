//! Usage counters carried by a grant.
//!
//! Counters are private and only move through methods that keep
//! `used <= limit`. Persistence restores them through `restore`, which
//! refuses rows that already violate the bound.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PlanKind, PlanTerms};
use crate::domain::foundation::ValidationError;

/// Weekly and monthly publishing allowance of a subscription grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUsage {
    weekly_limit: u32,
    weekly_used: u32,
    monthly_limit: u32,
    monthly_used: u32,
}

impl SubscriptionUsage {
    /// Fresh allowance with nothing used.
    pub fn new(weekly_limit: u32, monthly_limit: u32) -> Self {
        Self {
            weekly_limit,
            weekly_used: 0,
            monthly_limit,
            monthly_used: 0,
        }
    }

    /// Rebuilds counters loaded from storage.
    pub fn restore(
        weekly_limit: u32,
        weekly_used: u32,
        monthly_limit: u32,
        monthly_used: u32,
    ) -> Result<Self, ValidationError> {
        if weekly_used > weekly_limit {
            return Err(ValidationError::out_of_range(
                "weekly_used",
                0,
                weekly_limit as i64,
                weekly_used as i64,
            ));
        }
        if monthly_used > monthly_limit {
            return Err(ValidationError::out_of_range(
                "monthly_used",
                0,
                monthly_limit as i64,
                monthly_used as i64,
            ));
        }
        Ok(Self {
            weekly_limit,
            weekly_used,
            monthly_limit,
            monthly_used,
        })
    }

    pub fn weekly_limit(&self) -> u32 {
        self.weekly_limit
    }

    pub fn weekly_used(&self) -> u32 {
        self.weekly_used
    }

    pub fn monthly_limit(&self) -> u32 {
        self.monthly_limit
    }

    pub fn monthly_used(&self) -> u32 {
        self.monthly_used
    }

    pub fn weekly_remaining(&self) -> u32 {
        self.weekly_limit - self.weekly_used
    }

    pub fn monthly_remaining(&self) -> u32 {
        self.monthly_limit - self.monthly_used
    }

    /// Both windows must have room.
    pub fn has_capacity(&self) -> bool {
        self.weekly_used < self.weekly_limit && self.monthly_used < self.monthly_limit
    }

    /// Consumes one unit from both windows. Returns false (and changes
    /// nothing) when either window is full.
    pub fn debit(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.weekly_used += 1;
        self.monthly_used += 1;
        true
    }

    pub fn reset_weekly(&mut self) {
        self.weekly_used = 0;
    }

    pub fn reset_monthly(&mut self) {
        self.monthly_used = 0;
    }
}

/// Fixed pool of credits carried by a package grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUsage {
    total_credits: u32,
    used_credits: u32,
}

impl PackageUsage {
    pub fn new(total_credits: u32) -> Self {
        Self {
            total_credits,
            used_credits: 0,
        }
    }

    /// Rebuilds counters loaded from storage.
    pub fn restore(total_credits: u32, used_credits: u32) -> Result<Self, ValidationError> {
        if used_credits > total_credits {
            return Err(ValidationError::out_of_range(
                "used_credits",
                0,
                total_credits as i64,
                used_credits as i64,
            ));
        }
        Ok(Self {
            total_credits,
            used_credits,
        })
    }

    pub fn total_credits(&self) -> u32 {
        self.total_credits
    }

    pub fn used_credits(&self) -> u32 {
        self.used_credits
    }

    pub fn remaining(&self) -> u32 {
        self.total_credits - self.used_credits
    }

    pub fn has_capacity(&self) -> bool {
        self.used_credits < self.total_credits
    }

    /// Consumes one credit. Returns false (and changes nothing) when empty.
    pub fn debit(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.used_credits += 1;
        true
    }
}

/// Tagged usage of a grant; the variant fixes the grant's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantUsage {
    Subscription(SubscriptionUsage),
    Package(PackageUsage),
}

impl GrantUsage {
    /// Fresh counters for a grant issued under the given terms.
    pub fn from_terms(terms: &PlanTerms) -> Self {
        match *terms {
            PlanTerms::Subscription {
                weekly_limit,
                monthly_limit,
            } => GrantUsage::Subscription(SubscriptionUsage::new(weekly_limit, monthly_limit)),
            PlanTerms::Package { total_credits } => {
                GrantUsage::Package(PackageUsage::new(total_credits))
            }
        }
    }

    pub fn kind(&self) -> PlanKind {
        match self {
            GrantUsage::Subscription(_) => PlanKind::Subscription,
            GrantUsage::Package(_) => PlanKind::Package,
        }
    }

    pub fn has_capacity(&self) -> bool {
        match self {
            GrantUsage::Subscription(usage) => usage.has_capacity(),
            GrantUsage::Package(usage) => usage.has_capacity(),
        }
    }

    pub fn debit(&mut self) -> bool {
        match self {
            GrantUsage::Subscription(usage) => usage.debit(),
            GrantUsage::Package(usage) => usage.debit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_needs_room_in_both_windows() {
        let mut usage = SubscriptionUsage::new(1, 4);
        assert!(usage.debit());
        assert_eq!((usage.weekly_used(), usage.monthly_used()), (1, 1));

        // Monthly still has room but the week is full.
        assert!(!usage.has_capacity());
        assert!(!usage.debit());
        assert_eq!((usage.weekly_used(), usage.monthly_used()), (1, 1));
    }

    #[test]
    fn monthly_exhaustion_blocks_even_with_weekly_room() {
        let mut usage = SubscriptionUsage::restore(5, 0, 3, 3).unwrap();
        assert!(!usage.debit());
        assert_eq!(usage.weekly_remaining(), 5);
        assert_eq!(usage.monthly_remaining(), 0);
    }

    #[test]
    fn weekly_reset_leaves_monthly_alone() {
        let mut usage = SubscriptionUsage::restore(2, 2, 8, 6).unwrap();
        usage.reset_weekly();
        assert_eq!(usage.weekly_used(), 0);
        assert_eq!(usage.monthly_used(), 6);

        usage.reset_monthly();
        assert_eq!(usage.monthly_used(), 0);
    }

    #[test]
    fn restore_rejects_overdrawn_rows() {
        assert!(SubscriptionUsage::restore(1, 2, 4, 0).is_err());
        assert!(SubscriptionUsage::restore(1, 0, 4, 5).is_err());
        assert!(PackageUsage::restore(3, 4).is_err());
    }

    #[test]
    fn package_debits_until_empty() {
        let mut usage = PackageUsage::new(2);
        assert!(usage.debit());
        assert!(usage.debit());
        assert!(!usage.debit());
        assert_eq!(usage.used_credits(), 2);
        assert_eq!(usage.remaining(), 0);
    }

    #[test]
    fn usage_follows_plan_terms() {
        let usage = GrantUsage::from_terms(&PlanTerms::Package { total_credits: 10 });
        assert_eq!(usage.kind(), PlanKind::Package);
        assert!(usage.has_capacity());

        let usage = GrantUsage::from_terms(&PlanTerms::Subscription {
            weekly_limit: 1,
            monthly_limit: 4,
        });
        assert_eq!(usage.kind(), PlanKind::Subscription);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Op {
            Debit,
            ResetWeekly,
            ResetMonthly,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                6 => Just(Op::Debit),
                1 => Just(Op::ResetWeekly),
                1 => Just(Op::ResetMonthly),
            ]
        }

        proptest! {
            #[test]
            fn subscription_counters_stay_within_limits(
                weekly_limit in 1u32..5,
                monthly_limit in 1u32..12,
                ops in proptest::collection::vec(op(), 0..60),
            ) {
                let mut usage = SubscriptionUsage::new(weekly_limit, monthly_limit);
                for op in ops {
                    let before = usage;
                    match op {
                        Op::Debit => {
                            let debited = usage.debit();
                            prop_assert_eq!(debited, before.has_capacity());
                            if !debited {
                                prop_assert_eq!(usage, before);
                            }
                        }
                        Op::ResetWeekly => usage.reset_weekly(),
                        Op::ResetMonthly => usage.reset_monthly(),
                    }
                    prop_assert!(usage.weekly_used() <= usage.weekly_limit());
                    prop_assert!(usage.monthly_used() <= usage.monthly_limit());
                }
            }

            #[test]
            fn package_never_overdraws(total in 1u32..20, attempts in 0usize..40) {
                let mut usage = PackageUsage::new(total);
                let successes = (0..attempts).filter(|_| usage.debit()).count();
                prop_assert_eq!(successes, attempts.min(total as usize));
                prop_assert!(usage.used_credits() <= usage.total_credits());
            }
        }
    }
}
