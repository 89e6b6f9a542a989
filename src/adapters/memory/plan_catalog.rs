//! In-memory plan catalog.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::catalog::{canonical_name, Plan, PlanKind, PlanRecord};
use crate::domain::foundation::{DomainError, PlanId};
use crate::ports::PlanCatalog;

/// In-memory implementation of the PlanCatalog port.
///
/// Thread-safe via internal `Mutex`. Intended for tests and local runs.
#[derive(Default)]
pub struct InMemoryPlanCatalog {
    plans: Mutex<Vec<Plan>>,
}

impl InMemoryPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-loaded with the given plans.
    pub fn with_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: Mutex::new(plans.into_iter().collect()),
        }
    }

    /// Adds a plan, replacing any plan with the same id.
    pub fn insert(&self, plan: Plan) {
        let mut plans = self.plans.lock().unwrap();
        plans.retain(|p| p.id != plan.id);
        plans.push(plan);
    }

    /// Adds a plan from its storage shape, validating it first.
    pub fn insert_record(&self, record: PlanRecord) -> Result<Plan, DomainError> {
        let plan = Plan::try_from(record)?;
        self.insert(plan.clone());
        Ok(plan)
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        let plans = self.plans.lock().unwrap();
        Ok(plans.iter().find(|p| p.id == *id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Plan>, DomainError> {
        let name = match canonical_name(name) {
            Ok(name) => name,
            Err(_) => return Ok(None),
        };
        let plans = self.plans.lock().unwrap();
        Ok(plans.iter().find(|p| p.name == name).cloned())
    }

    async fn list_available(&self, kind: Option<PlanKind>) -> Result<Vec<Plan>, DomainError> {
        let plans = self.plans.lock().unwrap();
        let mut available: Vec<Plan> = plans
            .iter()
            .filter(|p| p.is_active && kind.map_or(true, |k| p.kind() == k))
            .cloned()
            .collect();
        available.sort_by(|a, b| {
            a.display_rank
                .cmp(&b.display_rank)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(available)
    }
}
