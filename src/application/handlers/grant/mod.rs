//! Grant handlers.
//!
//! ## Commands
//! - Initiating a purchase (creates a pending grant)
//! - Cancelling a grant on the owner's request

mod cancel_grant;
mod initiate_purchase;

pub use cancel_grant::{CancelGrantCommand, CancelGrantHandler, CancelGrantResult};
pub use initiate_purchase::{
    InitiatePurchaseCommand, InitiatePurchaseHandler, InitiatePurchaseResult,
};
