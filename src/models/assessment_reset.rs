use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only audit row, one per reset. Its row count per pair is the reset quota.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct AssessmentReset {
    pub id: i64,
    pub assessment_id: i64,
    pub user_id: i64,
    pub reset_by: i64,
    pub reset_type: String,
    pub reason: String,
    pub previous_status: String,
    pub previous_answers_count: i64,
    #[schema(value_type = String)]
    pub reset_at: NaiveDateTime,
}
