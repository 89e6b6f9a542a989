//! Lifecycle reconciler handlers.
//!
//! ## Commands
//! - Applying payment settlement events
//! - Expiring lapsed grants
//! - Resetting weekly and monthly subscription usage
//!
//! `ReconcilerJobs` wraps the sweep and resets as parameterless jobs for an
//! external scheduler.

mod expire_sweep;
mod jobs;
mod payment_event;
mod reset_usage;

pub use expire_sweep::{ExpireSweepCommand, ExpireSweepHandler, ExpireSweepResult};
pub use jobs::{JobReport, JobRun, ReconcilerJob, ReconcilerJobs};
pub use payment_event::{
    HandlePaymentEventCommand, HandlePaymentEventHandler, HandlePaymentEventResult,
};
pub use reset_usage::{ResetUsageCommand, ResetUsageHandler, ResetUsageResult};
