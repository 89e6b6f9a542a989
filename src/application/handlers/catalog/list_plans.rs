//! ListPlansHandler - Query handler for the purchasable catalog.

use std::sync::Arc;

use crate::domain::catalog::{Plan, PlanKind};
use crate::domain::entitlement::EntitlementError;
use crate::ports::PlanCatalog;

/// Query for plans on sale, optionally narrowed to one kind.
#[derive(Debug, Clone, Default)]
pub struct ListPlansQuery {
    pub kind: Option<PlanKind>,
}

pub struct ListPlansHandler {
    catalog: Arc<dyn PlanCatalog>,
}

impl ListPlansHandler {
    pub fn new(catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { catalog }
    }

    /// Returns active plans ordered by display rank, then name.
    pub async fn handle(&self, query: ListPlansQuery) -> Result<Vec<Plan>, EntitlementError> {
        Ok(self.catalog.list_available(query.kind).await?)
    }
}
