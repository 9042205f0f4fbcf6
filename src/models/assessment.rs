use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assessment {
    pub id: i64,
    pub title: String,
    /// Configured duration in minutes. `None` or non-positive means the default applies.
    pub duration: Option<i64>,
    pub allow_answer_editing: bool,
    pub use_question_limit: bool,
    pub questions_to_answer: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

impl Assessment {
    pub fn duration_or(&self, default_minutes: i64) -> i64 {
        match self.duration {
            Some(minutes) if minutes > 0 => minutes,
            _ => default_minutes,
        }
    }
}
