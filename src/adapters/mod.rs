//! Adapters - Implementations of the ports against concrete infrastructure.
//!
//! - `postgres`: production storage via sqlx
//! - `memory`: in-process storage for tests and local runs
//! - `http`: axum REST surface

pub mod http;
pub mod memory;
pub mod postgres;

pub use memory::{InMemoryGrantStore, InMemoryPlanCatalog};
pub use postgres::{PostgresGrantStore, PostgresPlanCatalog};
