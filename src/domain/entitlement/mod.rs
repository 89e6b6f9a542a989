//! Entitlement module - Who may publish, and which grant pays for it.

mod errors;
mod policy;
mod rights;

pub use errors::EntitlementError;
pub use policy::{debit_order, evaluate, DebitCandidate, EntitlementSnapshot};
pub use rights::{PublishingRights, RestrictionReason};
