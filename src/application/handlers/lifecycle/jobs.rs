//! Parameterless reconciler jobs for an external scheduler.
//!
//! Each job type is serialized in-process: an invocation that finds its own
//! job already running is skipped rather than queued. Different job types
//! run concurrently. Cross-process serialization is the storage adapter's
//! concern (advisory locks in PostgreSQL).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::expire_sweep::{ExpireSweepCommand, ExpireSweepHandler, ExpireSweepResult};
use super::reset_usage::{ResetUsageCommand, ResetUsageHandler, ResetUsageResult};
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::Timestamp;
use crate::domain::lifecycle::{ResetSchedule, UsageWindow};
use crate::ports::UsageLedger;

/// The scheduler-facing job names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilerJob {
    ExpireSweep,
    ResetWeekly,
    ResetMonthly,
}

impl ReconcilerJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcilerJob::ExpireSweep => "expire-sweep",
            ReconcilerJob::ResetWeekly => UsageWindow::Weekly.job_name(),
            ReconcilerJob::ResetMonthly => UsageWindow::Monthly.job_name(),
        }
    }
}

impl fmt::Display for ReconcilerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconcilerJob {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expire-sweep" => Ok(ReconcilerJob::ExpireSweep),
            "reset-weekly" => Ok(ReconcilerJob::ResetWeekly),
            "reset-monthly" => Ok(ReconcilerJob::ResetMonthly),
            _ => Err(EntitlementError::validation(
                "job",
                format!("unknown job '{}'", s),
            )),
        }
    }
}

/// Whether a job invocation did its work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRun<T> {
    Completed(T),
    /// Another invocation of the same job was still running.
    Skipped,
}

impl<T> JobRun<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, JobRun::Skipped)
    }
}

/// What any job produced, for callers that dispatch by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    Expired(ExpireSweepResult),
    Reset(ResetUsageResult),
}

pub struct ReconcilerJobs {
    expire: ExpireSweepHandler,
    reset: ResetUsageHandler,
    expire_running: Mutex<()>,
    weekly_running: Mutex<()>,
    monthly_running: Mutex<()>,
}

impl ReconcilerJobs {
    pub fn new(ledger: Arc<dyn UsageLedger>, schedule: ResetSchedule) -> Self {
        Self {
            expire: ExpireSweepHandler::new(ledger.clone()),
            reset: ResetUsageHandler::new(ledger, schedule),
            expire_running: Mutex::new(()),
            weekly_running: Mutex::new(()),
            monthly_running: Mutex::new(()),
        }
    }

    pub async fn expire_sweep(&self) -> Result<JobRun<ExpireSweepResult>, EntitlementError> {
        let _guard = match self.expire_running.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Ok(skipped(ReconcilerJob::ExpireSweep)),
        };
        let result = self
            .expire
            .handle(ExpireSweepCommand {
                now: Timestamp::now(),
            })
            .await?;
        Ok(JobRun::Completed(result))
    }

    pub async fn reset_weekly(&self) -> Result<JobRun<ResetUsageResult>, EntitlementError> {
        self.reset_window(UsageWindow::Weekly, &self.weekly_running).await
    }

    pub async fn reset_monthly(&self) -> Result<JobRun<ResetUsageResult>, EntitlementError> {
        self.reset_window(UsageWindow::Monthly, &self.monthly_running).await
    }

    /// Runs a job chosen by name.
    pub async fn run(&self, job: ReconcilerJob) -> Result<JobRun<JobReport>, EntitlementError> {
        let run = match job {
            ReconcilerJob::ExpireSweep => map_run(self.expire_sweep().await?, JobReport::Expired),
            ReconcilerJob::ResetWeekly => map_run(self.reset_weekly().await?, JobReport::Reset),
            ReconcilerJob::ResetMonthly => map_run(self.reset_monthly().await?, JobReport::Reset),
        };
        Ok(run)
    }

    async fn reset_window(
        &self,
        window: UsageWindow,
        running: &Mutex<()>,
    ) -> Result<JobRun<ResetUsageResult>, EntitlementError> {
        let _guard = match running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let job = match window {
                    UsageWindow::Weekly => ReconcilerJob::ResetWeekly,
                    UsageWindow::Monthly => ReconcilerJob::ResetMonthly,
                };
                return Ok(skipped(job));
            }
        };
        let result = self
            .reset
            .handle(ResetUsageCommand {
                window,
                at: Timestamp::now(),
            })
            .await?;
        Ok(JobRun::Completed(result))
    }
}

fn skipped<T>(job: ReconcilerJob) -> JobRun<T> {
    info!(job = %job, "Job already running, skipping invocation");
    JobRun::Skipped
}

fn map_run<T, U>(run: JobRun<T>, f: impl FnOnce(T) -> U) -> JobRun<U> {
    match run {
        JobRun::Completed(value) => JobRun::Completed(f(value)),
        JobRun::Skipped => JobRun::Skipped,
    }
}
