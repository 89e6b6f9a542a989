//! Reconciler configuration: when usage windows start.

use chrono::{FixedOffset, Weekday};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::lifecycle::ResetSchedule;

/// Reset boundaries for the weekly and monthly jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Offset from UTC, in minutes, of the timezone boundaries are computed in
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Day the weekly window starts, e.g. `mon`, `monday`
    #[serde(default = "default_weekly_reset_day")]
    pub weekly_reset_day: String,

    /// Day of month (1-28) the billing month starts
    #[serde(default = "default_monthly_reset_day")]
    pub monthly_reset_day: u32,
}

impl ReconcilerConfig {
    /// Builds the domain schedule, validating every field.
    pub fn schedule(&self) -> Result<ResetSchedule, ValidationError> {
        let offset = self
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ValidationError::InvalidUtcOffset(self.utc_offset_minutes))?;
        let weekday: Weekday = self
            .weekly_reset_day
            .parse()
            .map_err(|_| ValidationError::InvalidWeekday(self.weekly_reset_day.clone()))?;
        ResetSchedule::new(offset, weekday, self.monthly_reset_day)
            .map_err(|_| ValidationError::InvalidMonthlyResetDay(self.monthly_reset_day))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.schedule().map(|_| ())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            weekly_reset_day: default_weekly_reset_day(),
            monthly_reset_day: default_monthly_reset_day(),
        }
    }
}

fn default_weekly_reset_day() -> String {
    "monday".to_string()
}

fn default_monthly_reset_day() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_utc_monday_first() {
        let schedule = ReconcilerConfig::default().schedule().unwrap();
        assert_eq!(schedule, ResetSchedule::default());
    }

    #[test]
    fn test_custom_schedule() {
        let config = ReconcilerConfig {
            utc_offset_minutes: 420,
            weekly_reset_day: "sun".to_string(),
            monthly_reset_day: 15,
        };
        let schedule = config.schedule().unwrap();
        assert_eq!(schedule.utc_offset().local_minus_utc(), 420 * 60);
        assert_eq!(schedule.weekly_reset_day(), Weekday::Sun);
        assert_eq!(schedule.monthly_reset_day(), 15);
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let bad_day = ReconcilerConfig {
            weekly_reset_day: "someday".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_day.validate(), Err(ValidationError::InvalidWeekday(_))));

        let bad_month = ReconcilerConfig {
            monthly_reset_day: 31,
            ..Default::default()
        };
        assert!(matches!(
            bad_month.validate(),
            Err(ValidationError::InvalidMonthlyResetDay(31))
        ));

        let bad_offset = ReconcilerConfig {
            utc_offset_minutes: 24 * 60,
            ..Default::default()
        };
        assert!(matches!(bad_offset.validate(), Err(ValidationError::InvalidUtcOffset(_))));
    }

    #[test]
    fn test_absurd_offset_is_rejected_not_overflowed() {
        for minutes in [i32::MAX, i32::MIN, 40_000_000] {
            let config = ReconcilerConfig {
                utc_offset_minutes: minutes,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::InvalidUtcOffset(m)) if m == minutes
            ));
        }
    }
}
