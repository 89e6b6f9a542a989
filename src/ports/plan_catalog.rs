//! Plan catalog port (read-only).
//!
//! Implementations validate every stored row into a [`Plan`]; a row that
//! fails validation surfaces as `InvalidPlanConfiguration` rather than being
//! silently skipped.

use async_trait::async_trait;

use crate::domain::catalog::{Plan, PlanKind};
use crate::domain::foundation::{DomainError, PlanId};

/// Read-only lookup of catalog plans.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// Find a plan by id, whether or not it is still on sale.
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError>;

    /// Find a plan by canonical name (trimmed, lower case).
    async fn find_by_name(&self, name: &str) -> Result<Option<Plan>, DomainError>;

    /// Plans on sale, optionally of one kind, ordered by display rank then name.
    ///
    /// # Errors
    ///
    /// - `InvalidPlanConfiguration` if a stored plan fails validation
    /// - `DatabaseError` on storage failure
    async fn list_available(&self, kind: Option<PlanKind>) -> Result<Vec<Plan>, DomainError>;
}
