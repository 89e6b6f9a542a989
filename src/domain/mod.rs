//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `catalog` - Purchasable plan templates
//! - `grant` - User-owned subscriptions and credit packages with usage counters
//! - `entitlement` - Pure publishing policy and the engine's error taxonomy
//! - `lifecycle` - Payment settlement events and usage reset windows

pub mod catalog;
pub mod entitlement;
pub mod foundation;
pub mod grant;
pub mod lifecycle;
