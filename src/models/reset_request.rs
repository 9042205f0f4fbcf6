use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResetType {
    Partial,
    Full,
}

impl ResetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetType::Partial => "partial",
            ResetType::Full => "full",
        }
    }
}

impl fmt::Display for ResetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeCalculationMethod {
    #[default]
    RemainingTime,
    IssueTime,
}

/// Admin input that decides how much of the duration a partial reset credits as used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAdjustment {
    RemainingTime { remaining_minutes: i64 },
    IssueTime { issue_time: NaiveTime },
}

impl TimeAdjustment {
    pub fn method(&self) -> TimeCalculationMethod {
        match self {
            TimeAdjustment::RemainingTime { .. } => TimeCalculationMethod::RemainingTime,
            TimeAdjustment::IssueTime { .. } => TimeCalculationMethod::IssueTime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Partial(TimeAdjustment),
    Full,
}

impl ResetKind {
    pub fn reset_type(&self) -> ResetType {
        match self {
            ResetKind::Partial(_) => ResetType::Partial,
            ResetKind::Full => ResetType::Full,
        }
    }
}

/// One attempt selected for a reset, identified by its attempt, assessment and student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptTarget {
    pub attempt_id: i64,
    pub assessment_id: i64,
    pub student_id: i64,
}

impl fmt::Display for AttemptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.attempt_id, self.assessment_id, self.student_id
        )
    }
}

impl FromStr for AttemptTarget {
    type Err = Error;

    /// Parses an `attemptId-assessmentId-studentId` token.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::BadRequest(format!("Invalid attempt selection '{}'", token));

        let mut ids = token.trim().split('-').map(|part| {
            part.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(invalid)
        });

        let target = AttemptTarget {
            attempt_id: ids.next().ok_or_else(invalid)??,
            assessment_id: ids.next().ok_or_else(invalid)??,
            student_id: ids.next().ok_or_else(invalid)??,
        };
        if ids.next().is_some() {
            return Err(invalid());
        }
        Ok(target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    pub target: AttemptTarget,
    pub kind: ResetKind,
    pub reason: String,
    pub enable_edit_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkResetRequest {
    pub targets: Vec<AttemptTarget>,
    pub kind: ResetKind,
    pub reason: String,
    pub enable_edit_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attempt_token() {
        let target: AttemptTarget = "12-3-45".parse().unwrap();
        assert_eq!(
            target,
            AttemptTarget {
                attempt_id: 12,
                assessment_id: 3,
                student_id: 45
            }
        );
        assert_eq!(target.to_string(), "12-3-45");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["", "12-3", "12-3-45-6", "a-3-45", "12--45", "0-3-45", "12-3--45"] {
            assert!(
                token.parse::<AttemptTarget>().is_err(),
                "token {:?} should be rejected",
                token
            );
        }
    }
}
