//! Catalog plans: immutable templates from which grants are issued.
//!
//! Storage keeps subscription and package plans in one flexible row shape
//! ([`PlanRecord`]) with mutually exclusive nullable columns. The domain only
//! ever sees a validated [`Plan`] whose kind-specific fields live in the
//! tagged [`PlanTerms`], so a package can never carry weekly limits and a
//! subscription can never carry credits.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Price;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{PlanId, Timestamp};

/// Structural kind of a plan (and of the grants issued from it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Subscription,
    Package,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Subscription => "subscription",
            PlanKind::Package => "package",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subscription" => Some(PlanKind::Subscription),
            "package" => Some(PlanKind::Package),
            _ => None,
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific capacity of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanTerms {
    Subscription { weekly_limit: u32, monthly_limit: u32 },
    Package { total_credits: u32 },
}

impl PlanTerms {
    pub fn kind(&self) -> PlanKind {
        match self {
            PlanTerms::Subscription { .. } => PlanKind::Subscription,
            PlanTerms::Package { .. } => PlanKind::Package,
        }
    }
}

/// A validated catalog plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    /// Canonical lookup name: trimmed, lower case, never empty.
    pub name: String,
    pub display_name: String,
    pub price: Price,
    pub duration_days: u32,
    pub terms: PlanTerms,
    pub is_active: bool,
    pub display_rank: i32,
    /// Free-form JSON object shown alongside the plan.
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

impl Plan {
    /// Longest validity window a plan may grant, about a century.
    pub const MAX_DURATION_DAYS: u32 = 36_500;

    /// Builds an active plan with empty metadata.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPlanConfiguration` when the name is blank, the duration
    /// is zero, or the terms carry a zero capacity.
    pub fn new(
        name: &str,
        price: Price,
        duration_days: u32,
        terms: PlanTerms,
    ) -> Result<Self, EntitlementError> {
        let name = canonical_name(name)?;
        check_duration(&name, duration_days)?;
        check_terms(&name, &terms)?;

        Ok(Self {
            id: PlanId::new(),
            display_name: name.clone(),
            name,
            price,
            duration_days,
            terms,
            is_active: true,
            display_rank: 0,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Timestamp::now(),
        })
    }

    pub fn kind(&self) -> PlanKind {
        self.terms.kind()
    }

    /// Returns a copy with the given display rank.
    pub fn with_rank(mut self, display_rank: i32) -> Self {
        self.display_rank = display_rank;
        self
    }

    /// Returns a copy marked as withdrawn from sale.
    pub fn retired(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Storage shape of a plan with nullable kind-specific columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRecord {
    pub id: PlanId,
    pub kind: String,
    pub name: String,
    pub display_name: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub duration_days: i32,
    pub weekly_limit: Option<i32>,
    pub monthly_limit: Option<i32>,
    pub total_credits: Option<i32>,
    pub is_active: bool,
    pub display_rank: i32,
    /// Raw JSON text, validated on load.
    pub metadata: Option<String>,
    pub created_at: Timestamp,
}

impl TryFrom<PlanRecord> for Plan {
    type Error = EntitlementError;

    fn try_from(record: PlanRecord) -> Result<Self, Self::Error> {
        let name = canonical_name(&record.name)?;
        let invalid = |reason: String| EntitlementError::invalid_plan(name.clone(), reason);

        let kind = PlanKind::parse(&record.kind)
            .ok_or_else(|| invalid(format!("unknown plan kind '{}'", record.kind)))?;

        let terms = match kind {
            PlanKind::Subscription => {
                if record.total_credits.is_some() {
                    return Err(invalid("subscription plan carries total_credits".into()));
                }
                let weekly = required(&name, "weekly_limit", record.weekly_limit)?;
                let monthly = required(&name, "monthly_limit", record.monthly_limit)?;
                PlanTerms::Subscription {
                    weekly_limit: weekly,
                    monthly_limit: monthly,
                }
            }
            PlanKind::Package => {
                if record.weekly_limit.is_some() || record.monthly_limit.is_some() {
                    return Err(invalid("package plan carries weekly or monthly limits".into()));
                }
                PlanTerms::Package {
                    total_credits: required(&name, "total_credits", record.total_credits)?,
                }
            }
        };
        check_terms(&name, &terms)?;

        let duration_days = u32::try_from(record.duration_days)
            .map_err(|_| invalid(format!("negative duration_days {}", record.duration_days)))?;
        check_duration(&name, duration_days)?;

        let price = Price::new(record.price_cents, &record.currency)
            .map_err(|e| invalid(e.to_string()))?;

        let metadata = match record.metadata.as_deref() {
            None => serde_json::Value::Object(Default::default()),
            Some(raw) => {
                let value: serde_json::Value = serde_json::from_str(raw)
                    .map_err(|e| invalid(format!("metadata is not valid JSON: {}", e)))?;
                if !value.is_object() {
                    return Err(invalid("metadata must be a JSON object".into()));
                }
                value
            }
        };

        let display_name = record
            .display_name
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| name.clone());

        Ok(Plan {
            id: record.id,
            name,
            display_name,
            price,
            duration_days,
            terms,
            is_active: record.is_active,
            display_rank: record.display_rank,
            metadata,
            created_at: record.created_at,
        })
    }
}

impl From<&Plan> for PlanRecord {
    fn from(plan: &Plan) -> Self {
        let (weekly_limit, monthly_limit, total_credits) = match plan.terms {
            PlanTerms::Subscription {
                weekly_limit,
                monthly_limit,
            } => (Some(weekly_limit as i32), Some(monthly_limit as i32), None),
            PlanTerms::Package { total_credits } => (None, None, Some(total_credits as i32)),
        };

        PlanRecord {
            id: plan.id,
            kind: plan.kind().as_str().to_string(),
            name: plan.name.clone(),
            display_name: Some(plan.display_name.clone()),
            price_cents: plan.price.amount_cents(),
            currency: plan.price.currency().to_string(),
            duration_days: plan.duration_days as i32,
            weekly_limit,
            monthly_limit,
            total_credits,
            is_active: plan.is_active,
            display_rank: plan.display_rank,
            metadata: Some(plan.metadata.to_string()),
            created_at: plan.created_at,
        }
    }
}

/// Canonical plan name used for lookups.
pub fn canonical_name(raw: &str) -> Result<String, EntitlementError> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(EntitlementError::invalid_plan(raw, "plan name is empty"));
    }
    Ok(name)
}

fn required(plan: &str, field: &str, value: Option<i32>) -> Result<u32, EntitlementError> {
    let value = value.ok_or_else(|| {
        EntitlementError::invalid_plan(plan, format!("missing required field {}", field))
    })?;
    u32::try_from(value).map_err(|_| {
        EntitlementError::invalid_plan(plan, format!("{} must not be negative, got {}", field, value))
    })
}

fn check_terms(plan: &str, terms: &PlanTerms) -> Result<(), EntitlementError> {
    match *terms {
        PlanTerms::Subscription {
            weekly_limit,
            monthly_limit,
        } if weekly_limit == 0 || monthly_limit == 0 => Err(EntitlementError::invalid_plan(
            plan,
            "subscription limits must be positive",
        )),
        PlanTerms::Package { total_credits: 0 } => Err(EntitlementError::invalid_plan(
            plan,
            "package must carry at least one credit",
        )),
        _ => Ok(()),
    }
}

fn check_duration(plan: &str, duration_days: u32) -> Result<(), EntitlementError> {
    if duration_days == 0 {
        return Err(EntitlementError::invalid_plan(plan, "duration_days must be positive"));
    }
    if duration_days > Plan::MAX_DURATION_DAYS {
        return Err(EntitlementError::invalid_plan(
            plan,
            format!("duration_days must not exceed {}", Plan::MAX_DURATION_DAYS),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription_record() -> PlanRecord {
        PlanRecord {
            id: PlanId::new(),
            kind: "subscription".to_string(),
            name: "  Pro-Monthly ".to_string(),
            display_name: Some("Pro Monthly".to_string()),
            price_cents: 4900,
            currency: "usd".to_string(),
            duration_days: 30,
            weekly_limit: Some(2),
            monthly_limit: Some(8),
            total_credits: None,
            is_active: true,
            display_rank: 1,
            metadata: Some(r#"{"badge":"popular"}"#.to_string()),
            created_at: Timestamp::now(),
        }
    }

    fn package_record() -> PlanRecord {
        PlanRecord {
            kind: "package".to_string(),
            name: "ten-pack".to_string(),
            weekly_limit: None,
            monthly_limit: None,
            total_credits: Some(10),
            metadata: None,
            ..subscription_record()
        }
    }

    fn reason_of(result: Result<Plan, EntitlementError>) -> String {
        match result {
            Err(EntitlementError::InvalidPlanConfiguration { reason, .. }) => reason,
            other => panic!("expected InvalidPlanConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn subscription_record_becomes_tagged_terms() {
        let plan = Plan::try_from(subscription_record()).unwrap();

        assert_eq!(plan.name, "pro-monthly");
        assert_eq!(plan.display_name, "Pro Monthly");
        assert_eq!(plan.price.currency(), "USD");
        assert_eq!(
            plan.terms,
            PlanTerms::Subscription {
                weekly_limit: 2,
                monthly_limit: 8
            }
        );
        assert_eq!(plan.metadata["badge"], "popular");
    }

    #[test]
    fn package_record_without_metadata_gets_empty_object() {
        let plan = Plan::try_from(package_record()).unwrap();

        assert_eq!(plan.kind(), PlanKind::Package);
        assert_eq!(plan.terms, PlanTerms::Package { total_credits: 10 });
        assert!(plan.metadata.as_object().unwrap().is_empty());
    }

    #[test]
    fn subscription_with_credits_is_rejected() {
        let record = PlanRecord {
            total_credits: Some(5),
            ..subscription_record()
        };
        assert!(reason_of(Plan::try_from(record)).contains("total_credits"));
    }

    #[test]
    fn package_with_weekly_limit_is_rejected() {
        let record = PlanRecord {
            weekly_limit: Some(1),
            ..package_record()
        };
        assert!(reason_of(Plan::try_from(record)).contains("limits"));
    }

    #[test]
    fn missing_monthly_limit_is_rejected() {
        let record = PlanRecord {
            monthly_limit: None,
            ..subscription_record()
        };
        assert!(reason_of(Plan::try_from(record)).contains("monthly_limit"));
    }

    #[test]
    fn negative_price_is_rejected() {
        let record = PlanRecord {
            price_cents: -100,
            ..package_record()
        };
        assert!(Plan::try_from(record).is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let record = PlanRecord {
            kind: "bundle".to_string(),
            ..package_record()
        };
        assert!(reason_of(Plan::try_from(record)).contains("bundle"));
    }

    #[test]
    fn metadata_must_be_a_json_object() {
        let broken = PlanRecord {
            metadata: Some("{not json".to_string()),
            ..package_record()
        };
        assert!(reason_of(Plan::try_from(broken)).contains("valid JSON"));

        let array = PlanRecord {
            metadata: Some("[1,2]".to_string()),
            ..package_record()
        };
        assert!(reason_of(Plan::try_from(array)).contains("object"));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let record = PlanRecord {
            duration_days: 0,
            ..package_record()
        };
        assert!(reason_of(Plan::try_from(record)).contains("duration_days"));
    }

    #[test]
    fn plan_converts_back_to_record_shape() {
        let plan = Plan::try_from(package_record()).unwrap();
        let record = PlanRecord::from(&plan);

        assert_eq!(record.kind, "package");
        assert_eq!(record.total_credits, Some(10));
        assert!(record.weekly_limit.is_none());
        assert_eq!(Plan::try_from(record).unwrap(), plan);
    }

    #[test]
    fn new_rejects_blank_name() {
        let price = Price::new(0, "USD").unwrap();
        let result = Plan::new("   ", price, 30, PlanTerms::Package { total_credits: 1 });
        assert!(matches!(
            result,
            Err(EntitlementError::InvalidPlanConfiguration { .. })
        ));
    }

    #[test]
    fn new_rejects_unbounded_duration() {
        let price = Price::new(100, "USD").unwrap();
        let terms = PlanTerms::Package { total_credits: 5 };

        let result = Plan::new("forever", price.clone(), 100_000_000, terms.clone());
        assert!(matches!(
            result,
            Err(EntitlementError::InvalidPlanConfiguration { .. })
        ));
        assert!(Plan::new("century", price, Plan::MAX_DURATION_DAYS, terms).is_ok());
    }
}
