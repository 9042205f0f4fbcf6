use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::assessment_attempt::{STATUS_COMPLETED, STATUS_EXPIRED, STATUS_IN_PROGRESS};
use crate::models::reset_metadata::describe_time_info;

#[derive(Debug, Default, Clone)]
pub struct AttemptFilter {
    pub search: Option<String>,
    pub assessment_id: Option<i64>,
    pub status: Option<String>,
    pub class_id: Option<i64>,
}

#[derive(Debug, FromRow)]
struct AttemptRow {
    attempt_id: i64,
    assessment_id: i64,
    assessment_title: String,
    student_id: i64,
    username: String,
    first_name: String,
    last_name: String,
    class_id: Option<i64>,
    class_name: Option<String>,
    program_name: Option<String>,
    status: String,
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
    answer_metadata: Option<String>,
    edit_mode_enabled: bool,
    answered_questions: i64,
    total_questions: i64,
    reset_count: i64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AttemptListItem {
    pub attempt_id: i64,
    pub assessment_id: i64,
    pub assessment_title: String,
    pub student_id: i64,
    pub username: String,
    pub student_name: String,
    pub class_id: Option<i64>,
    pub class_name: Option<String>,
    pub program_name: Option<String>,
    pub status: String,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveDateTime>,
    pub answered_questions: i64,
    pub total_questions: i64,
    pub reset_count: i64,
    pub edit_mode_enabled: bool,
    pub time_info: Option<String>,
    /// Token accepted by the bulk reset endpoint.
    pub selection_token: String,
}

impl From<AttemptRow> for AttemptListItem {
    fn from(row: AttemptRow) -> Self {
        let time_info = describe_time_info(row.answer_metadata.as_deref());
        let student_name = format!("{} {}", row.first_name, row.last_name)
            .trim()
            .to_string();
        Self {
            selection_token: format!(
                "{}-{}-{}",
                row.attempt_id, row.assessment_id, row.student_id
            ),
            attempt_id: row.attempt_id,
            assessment_id: row.assessment_id,
            assessment_title: row.assessment_title,
            student_id: row.student_id,
            username: row.username,
            student_name,
            class_id: row.class_id,
            class_name: row.class_name,
            program_name: row.program_name,
            status: row.status,
            start_time: row.start_time,
            end_time: row.end_time,
            answered_questions: row.answered_questions,
            total_questions: row.total_questions,
            reset_count: row.reset_count,
            edit_mode_enabled: row.edit_mode_enabled,
            time_info,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, utoipa::ToSchema)]
pub struct AssessmentOption {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, FromRow, utoipa::ToSchema)]
pub struct ClassOption {
    pub id: i64,
    pub class_name: String,
    pub program_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FilterOptions {
    pub assessments: Vec<AssessmentOption>,
    pub classes: Vec<ClassOption>,
    #[schema(value_type = Vec<String>)]
    pub statuses: Vec<&'static str>,
}

/// `LIKE` pattern matching `search` literally anywhere in the column.
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone)]
pub struct AttemptListingService {
    pool: SqlitePool,
    limit: i64,
}

impl AttemptListingService {
    pub fn new(pool: SqlitePool, limit: i64) -> Self {
        Self {
            pool,
            limit: limit.max(1),
        }
    }

    /// Most recently started attempts matching `filter`, capped at the configured limit.
    pub async fn list(&self, filter: &AttemptFilter) -> Result<Vec<AttemptListItem>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                aa.id AS attempt_id,
                aa.assessment_id,
                a.title AS assessment_title,
                aa.user_id AS student_id,
                u.username,
                u.first_name,
                u.last_name,
                c.id AS class_id,
                c.class_name,
                p.program_name,
                aa.status,
                aa.start_time,
                aa.end_time,
                aa.answer_metadata,
                a.allow_answer_editing AS edit_mode_enabled,
                (SELECT COUNT(*) FROM student_answers sa
                  WHERE sa.assessment_id = aa.assessment_id AND sa.user_id = aa.user_id) AS answered_questions,
                CASE
                    WHEN a.use_question_limit = 1 AND COALESCE(a.questions_to_answer, 0) > 0
                    THEN MIN(a.questions_to_answer,
                             (SELECT COUNT(*) FROM questions q WHERE q.assessment_id = a.id))
                    ELSE (SELECT COUNT(*) FROM questions q WHERE q.assessment_id = a.id)
                END AS total_questions,
                (SELECT COUNT(*) FROM assessment_resets ar
                  WHERE ar.assessment_id = aa.assessment_id AND ar.user_id = aa.user_id) AS reset_count
            FROM assessment_attempts aa
            JOIN assessments a ON a.id = aa.assessment_id
            JOIN users u ON u.id = aa.user_id
            LEFT JOIN classes c ON c.id = u.class_id
            LEFT JOIN programs p ON p.id = c.program_id
            WHERE 1 = 1
            "#,
        );

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = contains_pattern(search);
            query
                .push(" AND (u.first_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR u.last_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR (u.first_name || ' ' || u.last_name) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR u.username LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(assessment_id) = filter.assessment_id {
            query.push(" AND aa.assessment_id = ").push_bind(assessment_id);
        }
        if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
            query.push(" AND aa.status = ").push_bind(status.to_string());
        }
        if let Some(class_id) = filter.class_id {
            query.push(" AND u.class_id = ").push_bind(class_id);
        }

        query
            .push(" ORDER BY aa.start_time DESC, aa.id DESC LIMIT ")
            .push_bind(self.limit);

        let rows = query
            .build_query_as::<AttemptRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AttemptListItem::from).collect())
    }

    pub async fn filter_options(&self) -> Result<FilterOptions> {
        let assessments = sqlx::query_as::<_, AssessmentOption>(
            "SELECT id, title FROM assessments ORDER BY title, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let classes = sqlx::query_as::<_, ClassOption>(
            r#"
            SELECT c.id, c.class_name, p.program_name
            FROM classes c
            LEFT JOIN programs p ON p.id = c.program_id
            ORDER BY c.class_name, c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(FilterOptions {
            assessments,
            classes,
            statuses: vec![STATUS_IN_PROGRESS, STATUS_COMPLETED, STATUS_EXPIRED],
        })
    }
}
