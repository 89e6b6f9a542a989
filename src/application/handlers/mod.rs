//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations over the
//! ports. Each handler owns `Arc<dyn Port>` collaborators and exposes a
//! single `handle` method.

pub mod catalog;
pub mod entitlement;
pub mod grant;
pub mod lifecycle;

pub use catalog::{GetPlanHandler, GetPlanQuery, ListPlansHandler, ListPlansQuery};
pub use entitlement::{
    ConsumeEntitlementCommand, ConsumeEntitlementHandler, ConsumeEntitlementResult,
    EvaluateEntitlementHandler, EvaluateEntitlementQuery,
};
pub use grant::{
    CancelGrantCommand, CancelGrantHandler, CancelGrantResult, InitiatePurchaseCommand,
    InitiatePurchaseHandler, InitiatePurchaseResult,
};
pub use lifecycle::{
    ExpireSweepCommand, ExpireSweepHandler, ExpireSweepResult, HandlePaymentEventCommand,
    HandlePaymentEventHandler, HandlePaymentEventResult, JobReport, JobRun, ReconcilerJob,
    ReconcilerJobs, ResetUsageCommand, ResetUsageHandler, ResetUsageResult,
};
