//! GetPlanHandler - Query handler for a single plan.

use std::sync::Arc;

use crate::domain::catalog::Plan;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::PlanId;
use crate::ports::PlanCatalog;

/// Looks a plan up by id or by canonical name.
///
/// Retired plans are still returned; only listing hides them.
#[derive(Debug, Clone)]
pub enum GetPlanQuery {
    ById(PlanId),
    ByName(String),
}

pub struct GetPlanHandler {
    catalog: Arc<dyn PlanCatalog>,
}

impl GetPlanHandler {
    pub fn new(catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { catalog }
    }

    /// # Errors
    ///
    /// - `PlanNotFound` if no plan matches
    pub async fn handle(&self, query: GetPlanQuery) -> Result<Plan, EntitlementError> {
        match query {
            GetPlanQuery::ById(id) => self
                .catalog
                .find_by_id(&id)
                .await?
                .ok_or_else(|| EntitlementError::plan_not_found(id.to_string())),
            GetPlanQuery::ByName(name) => self
                .catalog
                .find_by_name(&name)
                .await?
                .ok_or_else(|| EntitlementError::plan_not_found(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPlanCatalog;
    use crate::domain::catalog::{PlanTerms, Price};

    fn plan() -> Plan {
        Plan::new(
            "Starter",
            Price::new(900, "EUR").unwrap(),
            30,
            PlanTerms::Package { total_credits: 3 },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn finds_by_id_and_name() {
        let plan = plan();
        let handler = GetPlanHandler::new(Arc::new(InMemoryPlanCatalog::with_plans(vec![
            plan.clone(),
        ])));

        assert_eq!(handler.handle(GetPlanQuery::ById(plan.id)).await.unwrap(), plan);
        assert_eq!(
            handler
                .handle(GetPlanQuery::ByName("starter".to_string()))
                .await
                .unwrap()
                .id,
            plan.id
        );
    }

    #[tokio::test]
    async fn missing_plan_is_not_found() {
        let handler = GetPlanHandler::new(Arc::new(InMemoryPlanCatalog::new()));
        let result = handler.handle(GetPlanQuery::ByName("ghost".to_string())).await;

        assert!(matches!(result, Err(EntitlementError::PlanNotFound(name)) if name == "ghost"));
    }
}
