//! Entitlement policy: pure decision logic over a user's grants.
//!
//! Nothing here touches storage. Callers load an [`EntitlementSnapshot`]
//! and the policy decides eligibility and debit order. The debit itself is
//! a guarded update performed by the usage ledger; the order computed here
//! is only the sequence of candidates to try.

use super::{PublishingRights, RestrictionReason};
use crate::domain::catalog::PlanKind;
use crate::domain::foundation::{GrantId, Timestamp};
use crate::domain::grant::{Grant, GrantUsage};

/// The grants relevant to one user's entitlement decision.
#[derive(Debug, Clone, Default)]
pub struct EntitlementSnapshot {
    /// The user's active subscription, if any.
    pub subscription: Option<Grant>,
    /// The user's active packages.
    pub packages: Vec<Grant>,
    /// True when the user holds paid grants whose window has closed.
    pub has_lapsed: bool,
}

impl EntitlementSnapshot {
    pub fn new(subscription: Option<Grant>, packages: Vec<Grant>) -> Self {
        Self {
            subscription,
            packages,
            has_lapsed: false,
        }
    }

    pub fn with_lapsed(mut self, has_lapsed: bool) -> Self {
        self.has_lapsed = has_lapsed;
        self
    }
}

/// A grant to try debiting, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitCandidate {
    pub grant_id: GrantId,
    pub kind: PlanKind,
}

/// Computes publishing rights. Never mutates anything.
pub fn evaluate(snapshot: &EntitlementSnapshot, now: Timestamp) -> PublishingRights {
    let live_subscription = snapshot
        .subscription
        .as_ref()
        .filter(|g| g.kind() == PlanKind::Subscription && g.is_live(now));
    let live_packages: Vec<&Grant> = snapshot
        .packages
        .iter()
        .filter(|g| g.kind() == PlanKind::Package && g.is_live(now))
        .collect();

    let (weekly_remaining, monthly_remaining) = match live_subscription.map(|g| &g.usage) {
        Some(GrantUsage::Subscription(usage)) => {
            (Some(usage.weekly_remaining()), Some(usage.monthly_remaining()))
        }
        _ => (None, None),
    };

    // Saturates: several large packages can exceed u32 together.
    let credits_remaining = live_packages
        .iter()
        .map(|g| match &g.usage {
            GrantUsage::Package(usage) => usage.remaining(),
            GrantUsage::Subscription(_) => 0,
        })
        .fold(0u32, |total, remaining| total.saturating_add(remaining));

    let selected_grant = debit_order(snapshot, now).first().map(|c| c.grant_id);
    let can_publish = selected_grant.is_some();

    let restriction_reason = if can_publish {
        None
    } else {
        let anything_held =
            snapshot.subscription.is_some() || !snapshot.packages.is_empty() || snapshot.has_lapsed;
        Some(if !anything_held {
            RestrictionReason::NoActiveGrant
        } else if live_subscription.is_some() {
            RestrictionReason::LimitReached
        } else if !live_packages.is_empty() {
            RestrictionReason::CreditsExhausted
        } else {
            RestrictionReason::Expired
        })
    };

    PublishingRights {
        can_publish,
        restriction_reason,
        weekly_remaining,
        monthly_remaining,
        credits_remaining,
        selected_grant,
    }
}

/// Candidates to debit: the eligible subscription first, then eligible
/// packages oldest-created first.
pub fn debit_order(snapshot: &EntitlementSnapshot, now: Timestamp) -> Vec<DebitCandidate> {
    let subscription = snapshot
        .subscription
        .iter()
        .filter(|g| g.kind() == PlanKind::Subscription && g.is_eligible(now));

    let mut packages: Vec<&Grant> = snapshot
        .packages
        .iter()
        .filter(|g| g.kind() == PlanKind::Package && g.is_eligible(now))
        .collect();
    packages.sort_by_key(|g| g.created_at);

    subscription
        .chain(packages)
        .map(|g| DebitCandidate {
            grant_id: g.id,
            kind: g.kind(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Plan, PlanTerms, Price};
    use crate::domain::foundation::UserId;
    use crate::domain::grant::{PackageUsage, SubscriptionUsage};
    use proptest::prelude::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn active(terms: PlanTerms, created_at: Timestamp) -> Grant {
        let plan = Plan::new("plan", Price::new(100, "USD").unwrap(), 30, terms).unwrap();
        let mut grant = Grant::issue(&plan, user(), None, created_at).unwrap();
        grant.activate(created_at).unwrap();
        grant
    }

    fn subscription(weekly: (u32, u32), monthly: (u32, u32), now: Timestamp) -> Grant {
        let mut grant = active(
            PlanTerms::Subscription {
                weekly_limit: weekly.0,
                monthly_limit: monthly.0,
            },
            now,
        );
        grant.usage = GrantUsage::Subscription(
            SubscriptionUsage::restore(weekly.0, weekly.1, monthly.0, monthly.1).unwrap(),
        );
        grant
    }

    fn package(total: u32, used: u32, created_at: Timestamp) -> Grant {
        let mut grant = active(PlanTerms::Package { total_credits: total }, created_at);
        grant.usage = GrantUsage::Package(PackageUsage::restore(total, used).unwrap());
        grant
    }

    #[test]
    fn nothing_held_means_no_active_grant() {
        let rights = evaluate(&EntitlementSnapshot::default(), Timestamp::now());

        assert!(!rights.can_publish);
        assert_eq!(rights.restriction_reason, Some(RestrictionReason::NoActiveGrant));
        assert_eq!(rights.credits_remaining, 0);
        assert!(rights.weekly_remaining.is_none());
    }

    #[test]
    fn weekly_exhaustion_reports_limit_reached_despite_monthly_room() {
        let now = Timestamp::now();
        let snapshot = EntitlementSnapshot::new(Some(subscription((1, 1), (4, 1), now)), vec![]);
        let rights = evaluate(&snapshot, now);

        assert!(!rights.can_publish);
        assert_eq!(rights.restriction_reason, Some(RestrictionReason::LimitReached));
        assert_eq!(rights.weekly_remaining, Some(0));
        assert_eq!(rights.monthly_remaining, Some(3));
    }

    #[test]
    fn exhausted_packages_only_report_credits_exhausted() {
        let now = Timestamp::now();
        let snapshot = EntitlementSnapshot::new(None, vec![package(3, 3, now)]);

        assert_eq!(
            evaluate(&snapshot, now).restriction_reason,
            Some(RestrictionReason::CreditsExhausted)
        );
    }

    #[test]
    fn exhausted_subscription_outranks_exhausted_packages() {
        let now = Timestamp::now();
        let snapshot = EntitlementSnapshot::new(
            Some(subscription((1, 1), (4, 1), now)),
            vec![package(1, 1, now)],
        );

        assert_eq!(
            evaluate(&snapshot, now).restriction_reason,
            Some(RestrictionReason::LimitReached)
        );
    }

    #[test]
    fn exhausted_subscription_falls_back_to_package() {
        let now = Timestamp::now();
        let pkg = package(5, 0, now);
        let snapshot =
            EntitlementSnapshot::new(Some(subscription((1, 1), (4, 1), now)), vec![pkg.clone()]);
        let rights = evaluate(&snapshot, now);

        assert!(rights.can_publish);
        assert!(rights.restriction_reason.is_none());
        assert_eq!(rights.selected_grant, Some(pkg.id));
        assert_eq!(rights.credits_remaining, 5);
    }

    #[test]
    fn stale_active_grant_is_ineligible() {
        let now = Timestamp::now();
        let mut stale = package(10, 0, now.minus_days(60));
        stale.expired_at = Some(now.minus_days(1));
        let snapshot = EntitlementSnapshot::new(None, vec![stale]);
        let rights = evaluate(&snapshot, now);

        assert!(!rights.can_publish);
        assert_eq!(rights.restriction_reason, Some(RestrictionReason::Expired));
        assert_eq!(rights.credits_remaining, 0);
    }

    #[test]
    fn lapsed_flag_alone_reports_expired() {
        let snapshot = EntitlementSnapshot::default().with_lapsed(true);
        assert_eq!(
            evaluate(&snapshot, Timestamp::now()).restriction_reason,
            Some(RestrictionReason::Expired)
        );
    }

    #[test]
    fn subscription_is_preferred_over_packages() {
        let now = Timestamp::now();
        let sub = subscription((2, 0), (8, 0), now);
        let snapshot = EntitlementSnapshot::new(Some(sub.clone()), vec![package(5, 0, now)]);

        let order = debit_order(&snapshot, now);
        assert_eq!(order[0].grant_id, sub.id);
        assert_eq!(order[0].kind, PlanKind::Subscription);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn packages_are_ordered_oldest_first_regardless_of_input_order() {
        let now = Timestamp::now();
        let older = package(1, 0, now.minus_days(2));
        let newer = package(5, 0, now.minus_days(1));
        let snapshot = EntitlementSnapshot::new(None, vec![newer.clone(), older.clone()]);

        let ids: Vec<GrantId> = debit_order(&snapshot, now).iter().map(|c| c.grant_id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }

    #[test]
    fn exhausted_packages_are_skipped() {
        let now = Timestamp::now();
        let empty = package(1, 1, now.minus_days(2));
        let fresh = package(5, 0, now.minus_days(1));
        let snapshot = EntitlementSnapshot::new(None, vec![empty, fresh.clone()]);

        let order = debit_order(&snapshot, now);
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].grant_id, fresh.id);
    }

    #[test]
    fn huge_package_balances_saturate_instead_of_overflowing() {
        let now = Timestamp::now();
        let packages: Vec<Grant> = (0..3)
            .map(|i| package(2_000_000_000, 0, now.minus_days(i)))
            .collect();

        let rights = evaluate(&EntitlementSnapshot::new(None, packages), now);

        assert!(rights.can_publish);
        assert_eq!(rights.credits_remaining, u32::MAX);
    }

    proptest! {
        #[test]
        fn credits_remaining_never_wraps(
            totals in proptest::collection::vec(1u32..=u32::MAX, 0..5),
        ) {
            let now = Timestamp::now();
            let expected = totals
                .iter()
                .map(|t| *t as u64)
                .sum::<u64>()
                .min(u32::MAX as u64) as u32;
            let pkgs: Vec<Grant> = totals
                .iter()
                .enumerate()
                .map(|(i, total)| package(*total, 0, now.minus_days(i as i64)))
                .collect();

            let rights = evaluate(&EntitlementSnapshot::new(None, pkgs), now);

            prop_assert_eq!(rights.credits_remaining, expected);
        }

        #[test]
        fn can_publish_iff_some_grant_has_capacity(
            weekly in (1u32..4, 0u32..4),
            monthly in (1u32..6, 0u32..6),
            with_sub in any::<bool>(),
            packages in proptest::collection::vec((1u32..4, 0u32..4), 0..4),
        ) {
            let now = Timestamp::now();
            let weekly = (weekly.0, weekly.1.min(weekly.0));
            let monthly = (monthly.0, monthly.1.min(monthly.0));
            let sub = with_sub.then(|| subscription(weekly, monthly, now));
            let pkgs: Vec<Grant> = packages
                .iter()
                .enumerate()
                .map(|(i, (total, used))| package(*total, (*used).min(*total), now.minus_days(i as i64)))
                .collect();

            let any_capacity = sub.as_ref().map_or(false, |g| g.usage.has_capacity())
                || pkgs.iter().any(|g| g.usage.has_capacity());
            let snapshot = EntitlementSnapshot::new(sub, pkgs);
            let rights = evaluate(&snapshot, now);

            prop_assert_eq!(rights.can_publish, any_capacity);
            prop_assert_eq!(rights.restriction_reason.is_none(), rights.can_publish);
            prop_assert_eq!(rights.selected_grant.is_some(), rights.can_publish);
            prop_assert_eq!(debit_order(&snapshot, now).is_empty(), !any_capacity);
        }
    }
}
