//! Grant status state machine.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a grant.
///
/// `Cancelled` and `Expired` are terminal: once reached, a grant is never
/// consumed again and never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Purchase initiated, payment not yet confirmed.
    Pending,

    /// Paid and consumable until `expired_at`.
    Active,

    /// Cancelled by the owner, a failed payment, or a refund.
    Cancelled,

    /// Validity window has passed.
    Expired,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Pending => "pending",
            GrantStatus::Active => "active",
            GrantStatus::Cancelled => "cancelled",
            GrantStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GrantStatus::Pending),
            "active" => Some(GrantStatus::Active),
            "cancelled" => Some(GrantStatus::Cancelled),
            "expired" => Some(GrantStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for GrantStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use GrantStatus::*;
        matches!(
            (self, target),
            (Pending, Active) | (Pending, Cancelled) | (Pending, Expired)
                | (Active, Cancelled)
                | (Active, Expired)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use GrantStatus::*;
        match self {
            Pending => vec![Active, Cancelled, Expired],
            Active => vec![Cancelled, Expired],
            Cancelled | Expired => vec![],
        }
    }
}
