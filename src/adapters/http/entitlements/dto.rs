//! HTTP DTOs (Data Transfer Objects) for entitlement endpoints.
//!
//! These types define the JSON request/response structure for the API.
//! They serve as the boundary between HTTP and the application layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::handlers::lifecycle::HandlePaymentEventResult;
use crate::application::handlers::ConsumeEntitlementResult;
use crate::domain::catalog::{Plan, PlanKind, PlanTerms};
use crate::domain::entitlement::{PublishingRights, RestrictionReason};
use crate::domain::grant::{Grant, GrantStatus, GrantUsage};
use crate::domain::lifecycle::PaymentOutcome;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query string for `GET /api/plans`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPlansParams {
    #[serde(default)]
    pub kind: Option<PlanKind>,
}

/// Request to start a purchase.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePurchaseRequest {
    pub plan_id: String,
    /// Provider transaction id that will later settle this purchase.
    #[serde(default)]
    pub external_payment_ref: Option<String>,
}

/// Settlement event delivered by the payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWebhookRequest {
    pub external_ref: String,
    pub outcome: PaymentOutcome,
    /// When the provider says the outcome happened; defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// A purchasable plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub kind: PlanKind,
    pub price_cents: i64,
    pub currency: String,
    pub duration_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_credits: Option<u32>,
    pub metadata: serde_json::Value,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        let (weekly_limit, monthly_limit, total_credits) = match plan.terms {
            PlanTerms::Subscription {
                weekly_limit,
                monthly_limit,
            } => (Some(weekly_limit), Some(monthly_limit), None),
            PlanTerms::Package { total_credits } => (None, None, Some(total_credits)),
        };
        Self {
            id: plan.id.to_string(),
            kind: plan.terms.kind(),
            name: plan.name,
            display_name: plan.display_name,
            price_cents: plan.price.amount_cents(),
            currency: plan.price.currency().to_string(),
            duration_days: plan.duration_days,
            weekly_limit,
            monthly_limit,
            total_credits,
            metadata: plan.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<PlanResponse>,
}

/// Whether the user may publish, and what is left.
#[derive(Debug, Clone, Serialize)]
pub struct PublishingRightsResponse {
    pub can_publish: bool,
    pub restriction_reason: Option<RestrictionReason>,
    pub weekly_remaining: Option<u32>,
    pub monthly_remaining: Option<u32>,
    pub credits_remaining: u32,
    pub selected_grant_id: Option<String>,
}

impl From<PublishingRights> for PublishingRightsResponse {
    fn from(rights: PublishingRights) -> Self {
        Self {
            can_publish: rights.can_publish,
            restriction_reason: rights.restriction_reason,
            weekly_remaining: rights.weekly_remaining,
            monthly_remaining: rights.monthly_remaining,
            credits_remaining: rights.credits_remaining,
            selected_grant_id: rights.selected_grant.map(|id| id.to_string()),
        }
    }
}

/// The grant a successful consume debited.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeResponse {
    pub grant_id: String,
    pub kind: PlanKind,
}

impl From<ConsumeEntitlementResult> for ConsumeResponse {
    fn from(result: ConsumeEntitlementResult) -> Self {
        Self {
            grant_id: result.grant_id.to_string(),
            kind: result.kind,
        }
    }
}

/// Usage counters of a grant, by kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageResponse {
    Subscription {
        weekly_limit: u32,
        weekly_used: u32,
        monthly_limit: u32,
        monthly_used: u32,
    },
    Package {
        total_credits: u32,
        used_credits: u32,
    },
}

impl From<GrantUsage> for UsageResponse {
    fn from(usage: GrantUsage) -> Self {
        match usage {
            GrantUsage::Subscription(u) => UsageResponse::Subscription {
                weekly_limit: u.weekly_limit(),
                weekly_used: u.weekly_used(),
                monthly_limit: u.monthly_limit(),
                monthly_used: u.monthly_used(),
            },
            GrantUsage::Package(u) => UsageResponse::Package {
                total_credits: u.total_credits(),
                used_credits: u.used_credits(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GrantResponse {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub status: GrantStatus,
    pub price_cents: i64,
    pub currency: String,
    pub usage: UsageResponse,
    pub started_at: Option<String>,
    pub expired_at: Option<String>,
    pub external_payment_ref: Option<String>,
    pub created_at: String,
}

impl From<Grant> for GrantResponse {
    fn from(grant: Grant) -> Self {
        Self {
            id: grant.id.to_string(),
            user_id: grant.user_id.to_string(),
            plan_id: grant.plan_id.to_string(),
            status: grant.status,
            price_cents: grant.price.amount_cents(),
            currency: grant.price.currency().to_string(),
            usage: UsageResponse::from(grant.usage),
            started_at: grant.started_at.map(|t| t.as_datetime().to_rfc3339()),
            expired_at: grant.expired_at.map(|t| t.as_datetime().to_rfc3339()),
            external_payment_ref: grant.external_payment_ref,
            created_at: grant.created_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Acknowledgement of a payment event.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentWebhookResponse {
    pub grant_id: String,
    /// One of `activated`, `cancelled`, `already_applied`, `ignored`.
    pub result: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub superseded: Vec<String>,
}

impl From<HandlePaymentEventResult> for PaymentWebhookResponse {
    fn from(result: HandlePaymentEventResult) -> Self {
        match result {
            HandlePaymentEventResult::Activated {
                grant_id,
                superseded,
            } => Self {
                grant_id: grant_id.to_string(),
                result: "activated",
                superseded: superseded.iter().map(|id| id.to_string()).collect(),
            },
            HandlePaymentEventResult::Cancelled { grant_id } => Self {
                grant_id: grant_id.to_string(),
                result: "cancelled",
                superseded: vec![],
            },
            HandlePaymentEventResult::AlreadyApplied { grant_id } => Self {
                grant_id: grant_id.to_string(),
                result: "already_applied",
                superseded: vec![],
            },
            HandlePaymentEventResult::Ignored { grant_id, .. } => Self {
                grant_id: grant_id.to_string(),
                result: "ignored",
                superseded: vec![],
            },
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether the same request may succeed if sent again later.
    pub retryable: bool,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            retryable: false,
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(error_code, message)
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}
