//! Grant module - User-owned subscriptions and credit packages.
//!
//! A grant is issued `pending` when a purchase starts, becomes `active` on
//! confirmed payment, and ends `cancelled` or `expired`.

mod aggregate;
mod status;
mod usage;

pub use aggregate::Grant;
pub use status::GrantStatus;
pub use usage::{GrantUsage, PackageUsage, SubscriptionUsage};
