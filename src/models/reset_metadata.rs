use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::reset_request::{ResetType, TimeCalculationMethod};
use crate::utils::time::sql_datetime;

/// Time bookkeeping written for partial resets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTracking {
    pub calculation_method: TimeCalculationMethod,
    pub used_minutes: i64,
    pub remaining_minutes: i64,
    #[serde(default, with = "sql_datetime::option")]
    pub original_start_time: Option<NaiveDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "sql_datetime::option"
    )]
    pub issue_time: Option<NaiveDateTime>,
}

/// Shape of `assessment_attempts.answer_metadata` after a reset.
///
/// The student-facing attempt flow reads `custom_duration_minutes` as this attempt's
/// duration override and flips `timer_started` when the student opens the assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetMetadata {
    pub original_duration: i64,
    pub reset_type: ResetType,
    #[serde(with = "sql_datetime")]
    pub reset_timestamp: NaiveDateTime,
    pub reset_by: i64,
    pub reset_reason: String,
    pub timer_started: bool,
    #[serde(default)]
    pub edit_mode_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_duration_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_tracking: Option<TimeTracking>,
    #[serde(default)]
    pub reset_history: Vec<JsonValue>,
}

impl ResetMetadata {
    /// Appends the attempt's previous metadata (minus its own history) to the history
    /// it already carried. Unparseable or empty previous metadata adds nothing.
    pub fn carry_history_from(mut self, previous: Option<&str>) -> Self {
        self.reset_history = history_with_snapshot(previous);
        self
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn history_with_snapshot(previous: Option<&str>) -> Vec<JsonValue> {
    let Some(raw) = previous.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    let mut snapshot = match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(map)) => map,
        Ok(_) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparseable attempt metadata");
            return Vec::new();
        }
    };

    let mut history = match snapshot.remove("reset_history") {
        Some(JsonValue::Array(items)) => items,
        _ => Vec::new(),
    };
    if !snapshot.is_empty() {
        history.push(JsonValue::Object(snapshot));
    }
    history
}

/// Human readable timer state for the attempt listing.
pub fn describe_time_info(metadata: Option<&str>) -> Option<String> {
    let value: JsonValue = serde_json::from_str(metadata?.trim()).ok()?;

    let tracking = value.get("time_tracking").and_then(|t| {
        let used = t.get("used_minutes")?.as_i64()?;
        let remaining = t.get("remaining_minutes")?.as_i64()?;
        Some(format!("Used: {}min, Remaining: {}min", used, remaining))
    });
    let waiting = value.get("timer_started").and_then(JsonValue::as_bool) == Some(false);

    match (waiting, tracking) {
        (true, Some(tracking)) => Some(format!("Waiting for student access ({})", tracking)),
        (true, None) => Some("Waiting for student access".to_string()),
        (false, tracking) => tracking,
    }
}
