//! Publishing rights reported to the submission collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::EntitlementError;
use crate::domain::foundation::{GrantId, UserId};

/// Why a user may not publish right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionReason {
    /// Neither a subscription nor any package exists.
    NoActiveGrant,
    /// A live subscription exists but its weekly or monthly quota is used up.
    LimitReached,
    /// Only live packages exist, all of them empty.
    CreditsExhausted,
    /// Grants were paid for but their validity window has closed.
    Expired,
}

impl RestrictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestrictionReason::NoActiveGrant => "no_active_grant",
            RestrictionReason::LimitReached => "limit_reached",
            RestrictionReason::CreditsExhausted => "credits_exhausted",
            RestrictionReason::Expired => "expired",
        }
    }

    /// The user-facing error for this restriction.
    pub fn to_error(self, user_id: UserId) -> EntitlementError {
        match self {
            RestrictionReason::NoActiveGrant | RestrictionReason::Expired => {
                EntitlementError::NoActiveGrant(user_id)
            }
            RestrictionReason::LimitReached => EntitlementError::LimitReached(user_id),
            RestrictionReason::CreditsExhausted => EntitlementError::CreditsExhausted(user_id),
        }
    }
}

impl fmt::Display for RestrictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a user's grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishingRights {
    pub can_publish: bool,
    /// Set exactly when `can_publish` is false.
    pub restriction_reason: Option<RestrictionReason>,
    /// Remaining weekly allowance of the live subscription, if any.
    pub weekly_remaining: Option<u32>,
    /// Remaining monthly allowance of the live subscription, if any.
    pub monthly_remaining: Option<u32>,
    /// Sum of credits left across live packages.
    pub credits_remaining: u32,
    /// Grant a consume call would debit first.
    pub selected_grant: Option<GrantId>,
}
