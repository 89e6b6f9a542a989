//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPlanCatalog` - Catalog lookups, validating each row into a `Plan`
//! - `PostgresGrantStore` - Grant persistence plus guarded counter updates

mod grant_store;
mod plan_catalog;

pub use grant_store::PostgresGrantStore;
pub use plan_catalog::PostgresPlanCatalog;
