use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::error::Error;
use crate::models::reset_request::{
    AttemptTarget, BulkResetRequest, ResetKind, ResetRequest, ResetType, TimeAdjustment,
    TimeCalculationMethod,
};
use crate::services::attempt_listing_service::{AttemptFilter, AttemptListItem};
use crate::utils::time::parse_time_of_day;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct ResetAssessmentPayload {
    #[validate(range(min = 1, message = "Attempt id is required"))]
    pub attempt_id: i64,
    #[validate(range(min = 1, message = "Assessment id is required"))]
    pub assessment_id: i64,
    #[validate(range(min = 1, message = "Student id is required"))]
    pub student_id: i64,
    pub reset_type: ResetType,
    #[serde(default, deserialize_with = "trim_string")]
    #[validate(length(min = 1, message = "A reason for the reset is required"))]
    pub reason: String,
    #[serde(default)]
    pub enable_edit_mode: bool,
    #[serde(default)]
    pub time_calculation_method: TimeCalculationMethod,
    pub remaining_time_minutes: Option<i64>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub issue_time: Option<String>,
}

impl TryFrom<ResetAssessmentPayload> for ResetRequest {
    type Error = Error;

    fn try_from(payload: ResetAssessmentPayload) -> Result<Self, Self::Error> {
        payload.validate()?;
        let kind = reset_kind(
            payload.reset_type,
            payload.time_calculation_method,
            payload.remaining_time_minutes,
            payload.issue_time.as_deref(),
        )?;
        Ok(ResetRequest {
            target: AttemptTarget {
                attempt_id: payload.attempt_id,
                assessment_id: payload.assessment_id,
                student_id: payload.student_id,
            },
            kind,
            reason: payload.reason,
            enable_edit_mode: payload.enable_edit_mode,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct BulkResetPayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "Select at least one attempt to reset"))]
    pub selected_attempts: Vec<String>,
    pub bulk_reset_type: ResetType,
    #[serde(default, deserialize_with = "trim_string")]
    #[validate(length(min = 1, message = "A reason for the reset is required"))]
    pub bulk_reason: String,
    #[serde(default)]
    pub bulk_enable_edit_mode: bool,
    #[serde(default)]
    pub bulk_time_method: TimeCalculationMethod,
    pub bulk_remaining_time: Option<i64>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub bulk_issue_time: Option<String>,
}

impl TryFrom<BulkResetPayload> for BulkResetRequest {
    type Error = Error;

    fn try_from(payload: BulkResetPayload) -> Result<Self, Self::Error> {
        payload.validate()?;
        let kind = reset_kind(
            payload.bulk_reset_type,
            payload.bulk_time_method,
            payload.bulk_remaining_time,
            payload.bulk_issue_time.as_deref(),
        )?;
        let targets = payload
            .selected_attempts
            .iter()
            .map(|token| AttemptTarget::from_str(token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BulkResetRequest {
            targets,
            kind,
            reason: payload.bulk_reason,
            enable_edit_mode: payload.bulk_enable_edit_mode,
        })
    }
}

/// Time inputs are only required, and only checked, for partial resets.
fn reset_kind(
    reset_type: ResetType,
    method: TimeCalculationMethod,
    remaining_minutes: Option<i64>,
    issue_time: Option<&str>,
) -> Result<ResetKind, Error> {
    if reset_type == ResetType::Full {
        return Ok(ResetKind::Full);
    }

    let adjustment = match method {
        TimeCalculationMethod::RemainingTime => match remaining_minutes {
            Some(remaining_minutes) if remaining_minutes > 0 => {
                TimeAdjustment::RemainingTime { remaining_minutes }
            }
            _ => {
                return Err(Error::BadRequest(
                    "Remaining time in minutes is required and must be greater than zero"
                        .to_string(),
                ))
            }
        },
        TimeCalculationMethod::IssueTime => {
            let raw = issue_time.ok_or_else(|| {
                Error::BadRequest("Issue time is required for the issue time method".to_string())
            })?;
            let issue_time = parse_time_of_day(raw).ok_or_else(|| {
                Error::BadRequest(format!("Invalid issue time '{}', expected HH:MM", raw))
            })?;
            TimeAdjustment::IssueTime { issue_time }
        }
    };
    Ok(ResetKind::Partial(adjustment))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttemptListQuery {
    #[serde(deserialize_with = "trim_optional_string")]
    pub search: Option<String>,
    #[serde(deserialize_with = "optional_id")]
    pub assessment_id: Option<i64>,
    #[serde(deserialize_with = "trim_optional_string")]
    pub status: Option<String>,
    #[serde(deserialize_with = "optional_id")]
    pub class_id: Option<i64>,
}

impl From<AttemptListQuery> for AttemptFilter {
    fn from(query: AttemptListQuery) -> Self {
        AttemptFilter {
            search: query.search,
            assessment_id: query.assessment_id,
            status: query.status,
            class_id: query.class_id,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptListResponse {
    pub items: Vec<AttemptListItem>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ResetHistoryQuery {
    pub assessment_id: i64,
    pub student_id: i64,
}

fn trim_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.map(|s| s.trim().to_string()).unwrap_or_default())
}

// Trims strings and converts empty strings to None
fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

// Query strings send empty filters as `assessment_id=`
fn optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match trim_optional_string(deserializer)? {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
