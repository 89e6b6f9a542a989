//! Entitlement handlers.
//!
//! ## Queries
//! - Evaluate a user's publishing rights
//!
//! ## Commands
//! - Consume one publish against the user's grants

mod consume;
mod evaluate;
mod snapshot;

pub use consume::{ConsumeEntitlementCommand, ConsumeEntitlementHandler, ConsumeEntitlementResult};
pub use evaluate::{EvaluateEntitlementHandler, EvaluateEntitlementQuery};
