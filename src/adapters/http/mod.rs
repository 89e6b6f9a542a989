//! HTTP adapters - REST API implementations.

pub mod entitlements;

pub use entitlements::{entitlement_router, EntitlementAppState};
