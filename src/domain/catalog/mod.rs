//! Catalog module - Purchasable plan templates.
//!
//! Plans are read-only from the engine's point of view. A grant snapshots
//! what it needs (price, duration, limits) at purchase time and never
//! writes back to its plan.

mod plan;
mod price;

pub use plan::{canonical_name, Plan, PlanKind, PlanRecord, PlanTerms};
pub use price::Price;
