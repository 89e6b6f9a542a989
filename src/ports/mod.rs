//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Catalog Ports
//!
//! - `PlanCatalog` - Read-only lookup of purchasable plans
//!
//! ## Grant Ports
//!
//! - `GrantRepository` - Grant persistence, liveness-filtered finders, guarded status changes
//! - `UsageLedger` - Guarded counter debits, expiry sweep, once-per-boundary resets

mod grant_repository;
mod plan_catalog;
mod usage_ledger;

pub use grant_repository::{ActivationOutcome, GrantRepository};
pub use plan_catalog::PlanCatalog;
pub use usage_ledger::{ResetOutcome, UsageLedger};
