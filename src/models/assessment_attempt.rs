use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_EXPIRED: &str = "expired";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentAttempt {
    pub id: i64,
    pub assessment_id: i64,
    pub user_id: i64,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub status: String,
    pub answer_metadata: Option<String>,
}

impl AssessmentAttempt {
    pub fn belongs_to(&self, assessment_id: i64, student_id: i64) -> bool {
        self.assessment_id == assessment_id && self.user_id == student_id
    }
}
