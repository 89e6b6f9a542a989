//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait, and the
//! error types every other domain module builds on.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{GrantId, PlanId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
