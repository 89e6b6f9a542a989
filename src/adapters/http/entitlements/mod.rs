//! HTTP adapter for entitlement endpoints.
//!
//! Exposes the engine via REST API. Identity is resolved upstream; the user
//! id travels in the path.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{EntitlementApiError, EntitlementAppState};
pub use routes::entitlement_router;
