//! Lifecycle module - Payment settlement and usage window boundaries.

mod payment;
mod schedule;

pub use payment::{PaymentEvent, PaymentOutcome};
pub use schedule::{ResetBoundary, ResetSchedule, UsageWindow};
