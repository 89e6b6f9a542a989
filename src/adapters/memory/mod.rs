//! In-memory adapters for tests and local runs.

mod grant_store;
mod plan_catalog;

pub use grant_store::InMemoryGrantStore;
pub use plan_catalog::InMemoryPlanCatalog;
