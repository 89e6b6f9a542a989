//! Usage reset windows and their boundaries.
//!
//! The engine does not decide *when* resets run; an external trigger does.
//! It only needs to know which boundary an invocation belongs to, so that a
//! reset is applied at most once per boundary no matter how often the
//! trigger fires.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, ValidationError};

/// Which usage counter a reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageWindow {
    Weekly,
    Monthly,
}

impl UsageWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageWindow::Weekly => "weekly",
            UsageWindow::Monthly => "monthly",
        }
    }

    /// Scheduler job name for this window's reset.
    pub fn job_name(&self) -> &'static str {
        match self {
            UsageWindow::Weekly => "reset-weekly",
            UsageWindow::Monthly => "reset-monthly",
        }
    }
}

impl fmt::Display for UsageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The start of one reset window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResetBoundary {
    pub window: UsageWindow,
    /// Local midnight of the boundary day, as an instant.
    pub starts_at: Timestamp,
    /// Stable dedupe key, e.g. `weekly:2026-10-12`.
    pub key: String,
}

/// When weekly and monthly windows start, in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSchedule {
    utc_offset: FixedOffset,
    weekly_reset_day: Weekday,
    monthly_reset_day: u32,
}

impl ResetSchedule {
    /// Latest day every month has.
    pub const MAX_MONTHLY_RESET_DAY: u32 = 28;

    /// # Errors
    ///
    /// Returns `ValidationError` if the monthly day is outside 1..=28.
    pub fn new(
        utc_offset: FixedOffset,
        weekly_reset_day: Weekday,
        monthly_reset_day: u32,
    ) -> Result<Self, ValidationError> {
        if !(1..=Self::MAX_MONTHLY_RESET_DAY).contains(&monthly_reset_day) {
            return Err(ValidationError::out_of_range(
                "monthly_reset_day",
                1,
                Self::MAX_MONTHLY_RESET_DAY as i64,
                monthly_reset_day as i64,
            ));
        }
        Ok(Self {
            utc_offset,
            weekly_reset_day,
            monthly_reset_day,
        })
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    pub fn weekly_reset_day(&self) -> Weekday {
        self.weekly_reset_day
    }

    pub fn monthly_reset_day(&self) -> u32 {
        self.monthly_reset_day
    }

    /// The most recent boundary of `window` at or before `at`.
    pub fn boundary_for(&self, window: UsageWindow, at: Timestamp) -> ResetBoundary {
        let today = at.at_offset(self.utc_offset).date_naive();
        let day = match window {
            UsageWindow::Weekly => self.last_weekly_day(today),
            UsageWindow::Monthly => self.last_monthly_day(today),
        };

        ResetBoundary {
            window,
            starts_at: self.local_midnight(day),
            key: format!("{}:{}", window.as_str(), day),
        }
    }

    fn last_weekly_day(&self, today: NaiveDate) -> NaiveDate {
        let current = today.weekday().num_days_from_monday() as i64;
        let target = self.weekly_reset_day.num_days_from_monday() as i64;
        today - Duration::days((current - target).rem_euclid(7))
    }

    fn last_monthly_day(&self, today: NaiveDate) -> NaiveDate {
        let first_of_month = today - Duration::days(today.day0() as i64);
        let offset = Duration::days(self.monthly_reset_day as i64 - 1);
        if today.day() >= self.monthly_reset_day {
            first_of_month + offset
        } else {
            let last_of_previous = first_of_month - Duration::days(1);
            let first_of_previous = last_of_previous - Duration::days(last_of_previous.day0() as i64);
            first_of_previous + offset
        }
    }

    fn local_midnight(&self, day: NaiveDate) -> Timestamp {
        let local = day.and_time(NaiveTime::MIN);
        let utc = local - Duration::seconds(self.utc_offset.local_minus_utc() as i64);
        Timestamp::from_datetime(Utc.from_utc_datetime(&utc))
    }
}

impl Default for ResetSchedule {
    /// Mondays and the 1st of the month, UTC.
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            weekly_reset_day: Weekday::Mon,
            monthly_reset_day: 1,
        }
    }
}
