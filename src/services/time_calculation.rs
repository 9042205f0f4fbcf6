use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::models::reset_metadata::TimeTracking;
use crate::models::reset_request::{TimeAdjustment, TimeCalculationMethod};

/// Minutes credited as used and still available after a partial reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAllocation {
    pub method: TimeCalculationMethod,
    pub used_minutes: i64,
    pub remaining_minutes: i64,
    pub original_start_time: Option<NaiveDateTime>,
    pub issue_time: Option<NaiveDateTime>,
}

impl TimeAllocation {
    pub fn time_tracking(&self) -> TimeTracking {
        TimeTracking {
            calculation_method: self.method,
            used_minutes: self.used_minutes,
            remaining_minutes: self.remaining_minutes,
            original_start_time: self.original_start_time,
            issue_time: self.issue_time,
        }
    }
}

/// Splits `duration_minutes` into used and remaining time for a partial reset.
///
/// `start_time` is the attempt's original start; it is required by the issue-time
/// method, which anchors the admin's time of day on the start date.
pub fn calculate(
    adjustment: &TimeAdjustment,
    duration_minutes: i64,
    start_time: Option<NaiveDateTime>,
) -> Result<TimeAllocation> {
    match *adjustment {
        TimeAdjustment::RemainingTime { remaining_minutes } => {
            if remaining_minutes <= 0 {
                return Err(Error::TimeCalculation(
                    "Remaining time must be greater than zero".to_string(),
                ));
            }
            if remaining_minutes > duration_minutes {
                return Err(Error::TimeCalculation(format!(
                    "Remaining time ({} min) cannot exceed the assessment duration ({} min)",
                    remaining_minutes, duration_minutes
                )));
            }

            Ok(TimeAllocation {
                method: adjustment.method(),
                used_minutes: duration_minutes - remaining_minutes,
                remaining_minutes,
                original_start_time: start_time,
                issue_time: None,
            })
        }
        TimeAdjustment::IssueTime { issue_time } => {
            let start = start_time.ok_or_else(|| {
                Error::TimeCalculation(
                    "Attempt has no recorded start time; use the remaining time method".to_string(),
                )
            })?;
            let issued_at = start.date().and_time(issue_time);
            if issued_at <= start {
                return Err(Error::TimeCalculation(
                    "Issue time must be after start time".to_string(),
                ));
            }

            let elapsed_seconds = (issued_at - start).num_seconds();
            let used_minutes = (elapsed_seconds as f64 / 60.0).round() as i64;
            let remaining_minutes = duration_minutes - used_minutes;
            if remaining_minutes <= 0 {
                return Err(Error::TimeCalculation(format!(
                    "Student has already used {} min of the {} min duration; no time remains",
                    used_minutes, duration_minutes
                )));
            }

            Ok(TimeAllocation {
                method: adjustment.method(),
                used_minutes,
                remaining_minutes,
                original_start_time: Some(start),
                issue_time: Some(issued_at),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::{from_sql_datetime, parse_time_of_day};

    fn start() -> Option<NaiveDateTime> {
        Some(from_sql_datetime("2025-01-10 09:00:00").unwrap())
    }

    fn issue(at: &str) -> TimeAdjustment {
        TimeAdjustment::IssueTime {
            issue_time: parse_time_of_day(at).unwrap(),
        }
    }

    #[test]
    fn remaining_time_credits_the_rest_as_used() {
        let allocation = calculate(
            &TimeAdjustment::RemainingTime { remaining_minutes: 15 },
            60,
            start(),
        )
        .unwrap();
        assert_eq!(allocation.used_minutes, 45);
        assert_eq!(allocation.remaining_minutes, 15);
        assert_eq!(allocation.used_minutes + allocation.remaining_minutes, 60);
    }

    #[test]
    fn remaining_time_may_equal_the_full_duration() {
        let allocation = calculate(
            &TimeAdjustment::RemainingTime { remaining_minutes: 60 },
            60,
            None,
        )
        .unwrap();
        assert_eq!(allocation.used_minutes, 0);
    }

    #[test]
    fn remaining_time_out_of_range_is_rejected() {
        for remaining_minutes in [0, -5, 61] {
            let err = calculate(
                &TimeAdjustment::RemainingTime { remaining_minutes },
                60,
                start(),
            )
            .unwrap_err();
            assert!(matches!(err, Error::TimeCalculation(_)));
        }
    }

    #[test]
    fn issue_time_measures_from_the_original_start() {
        let allocation = calculate(&issue("09:20"), 60, start()).unwrap();
        assert_eq!(allocation.used_minutes, 20);
        assert_eq!(allocation.remaining_minutes, 40);
        assert_eq!(
            allocation.issue_time,
            Some(from_sql_datetime("2025-01-10 09:20:00").unwrap())
        );
    }

    #[test]
    fn issue_time_rounds_to_the_nearest_minute() {
        let allocation = calculate(&issue("09:20:30"), 60, start()).unwrap();
        assert_eq!(allocation.used_minutes, 21);
        let allocation = calculate(&issue("09:20:29"), 60, start()).unwrap();
        assert_eq!(allocation.used_minutes, 20);
    }

    #[test]
    fn issue_time_before_start_is_rejected() {
        let err = calculate(&issue("08:50"), 60, start()).unwrap_err();
        assert_eq!(err.to_string(), "Issue time must be after start time");

        let err = calculate(&issue("09:00"), 60, start()).unwrap_err();
        assert_eq!(err.to_string(), "Issue time must be after start time");
    }

    #[test]
    fn issue_time_past_the_duration_is_rejected() {
        let err = calculate(&issue("10:00"), 60, start()).unwrap_err();
        assert!(matches!(err, Error::TimeCalculation(_)));
        assert!(calculate(&issue("09:59"), 60, start()).is_ok());
    }

    #[test]
    fn issue_time_needs_a_start_time() {
        let err = calculate(&issue("09:20"), 60, None).unwrap_err();
        assert!(matches!(err, Error::TimeCalculation(_)));
    }
}
