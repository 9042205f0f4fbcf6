use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::json;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::assessment::Assessment;
use crate::models::assessment_attempt::{AssessmentAttempt, STATUS_IN_PROGRESS};
use crate::models::assessment_reset::AssessmentReset;
use crate::models::reset_metadata::ResetMetadata;
use crate::models::reset_request::{
    AttemptTarget, BulkResetRequest, ResetKind, ResetRequest, ResetType,
};
use crate::services::activity_service;
use crate::services::time_calculation::{self, TimeAllocation};
use crate::utils::time::now;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    pub max_resets_per_student: i64,
    pub default_duration_minutes: i64,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            max_resets_per_student: 5,
            default_duration_minutes: 60,
        }
    }
}

impl ResetPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_resets_per_student: config.max_resets_per_student,
            default_duration_minutes: config.default_duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ResetOutcome {
    pub message: String,
    pub reset_id: i64,
    pub attempt_id: i64,
    pub assessment_id: i64,
    pub student_id: i64,
    pub reset_type: ResetType,
    pub used_minutes: Option<i64>,
    pub remaining_minutes: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BulkItemStatus {
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkItemOutcome {
    pub token: String,
    pub status: BulkItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkResetOutcome {
    pub message: String,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<BulkItemOutcome>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ResetHistory {
    pub assessment_id: i64,
    pub student_id: i64,
    pub reset_count: i64,
    pub remaining_resets: i64,
    pub resets: Vec<AssessmentReset>,
}

/// Result of steps shared by single and bulk resets.
struct AppliedReset {
    reset_id: i64,
    allocation: Option<TimeAllocation>,
}

#[derive(Clone)]
pub struct ResetService {
    pool: SqlitePool,
    policy: ResetPolicy,
}

impl ResetService {
    pub fn new(pool: SqlitePool, policy: ResetPolicy) -> Self {
        Self { pool, policy }
    }

    /// Resets one attempt inside a single transaction. Any error rolls everything back
    /// and is returned unchanged.
    pub async fn reset(&self, admin_id: i64, request: &ResetRequest) -> Result<ResetOutcome> {
        let mut tx = self.pool.begin().await?;
        match self.reset_in(&mut tx, admin_id, request).await {
            Ok(outcome) => {
                tx.commit().await?;
                tracing::info!(
                    admin_id,
                    attempt_id = outcome.attempt_id,
                    assessment_id = outcome.assessment_id,
                    student_id = outcome.student_id,
                    reset_type = %outcome.reset_type,
                    reset_id = outcome.reset_id,
                    "assessment reset"
                );
                Ok(outcome)
            }
            Err(e) => {
                rollback(tx, &e).await;
                Err(e)
            }
        }
    }

    async fn reset_in(
        &self,
        conn: &mut SqliteConnection,
        admin_id: i64,
        request: &ResetRequest,
    ) -> Result<ResetOutcome> {
        let target = request.target;

        let attempt = claim_attempt(conn, target.attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound("Assessment attempt not found".to_string()))?;
        if !attempt.belongs_to(target.assessment_id, target.student_id) {
            return Err(Error::NotFound(
                "Assessment attempt does not belong to this assessment and student".to_string(),
            ));
        }

        let assessment = find_assessment(conn, target.assessment_id)
            .await?
            .ok_or_else(|| Error::NotFound("Assessment not found".to_string()))?;

        let reset_count = count_resets(conn, target.assessment_id, target.student_id).await?;
        if reset_count >= self.policy.max_resets_per_student {
            return Err(Error::QuotaExceeded(format!(
                "Maximum resets reached: this student has already been reset {} times for this assessment (limit {})",
                reset_count, self.policy.max_resets_per_student
            )));
        }

        let applied = self
            .apply(
                conn,
                admin_id,
                &attempt,
                &assessment,
                &request.kind,
                &request.reason,
                request.enable_edit_mode,
            )
            .await?;

        if request.enable_edit_mode {
            enable_edit_mode(conn, assessment.id).await?;
        }

        let reset_type = request.kind.reset_type();
        activity_service::log(
            conn,
            Some(admin_id),
            "reset_assessment",
            "assessment_attempt",
            Some(attempt.id),
            Some(json!({
                "assessment_id": target.assessment_id,
                "student_id": target.student_id,
                "reset_type": reset_type,
                "reason": request.reason,
            })),
        )
        .await?;

        let message = match applied.allocation {
            Some(allocation) => format!(
                "Assessment partially reset. {} min remaining ({} min counted as used); the timer will start when the student next opens the assessment.",
                allocation.remaining_minutes, allocation.used_minutes
            ),
            None => "Assessment fully reset. Answers and results were removed; the student will start a new attempt on next access.".to_string(),
        };

        Ok(ResetOutcome {
            message,
            reset_id: applied.reset_id,
            attempt_id: attempt.id,
            assessment_id: target.assessment_id,
            student_id: target.student_id,
            reset_type,
            used_minutes: applied.allocation.map(|a| a.used_minutes),
            remaining_minutes: applied.allocation.map(|a| a.remaining_minutes),
        })
    }

    /// Resets every selected attempt inside one transaction. Items whose preconditions
    /// do not hold are skipped or failed without writing anything; an unexpected error
    /// on any item rolls back the whole batch.
    pub async fn bulk_reset(
        &self,
        admin_id: i64,
        request: &BulkResetRequest,
    ) -> Result<BulkResetOutcome> {
        let mut tx = self.pool.begin().await?;
        match self.bulk_reset_in(&mut tx, admin_id, request).await {
            Ok(outcome) => {
                tx.commit().await?;
                tracing::info!(
                    admin_id,
                    reset_type = %request.kind.reset_type(),
                    selected = request.targets.len(),
                    succeeded = outcome.succeeded,
                    skipped = outcome.skipped,
                    failed = outcome.failed,
                    "bulk assessment reset"
                );
                Ok(outcome)
            }
            Err(e) => {
                rollback(tx, &e).await;
                Err(e)
            }
        }
    }

    async fn bulk_reset_in(
        &self,
        conn: &mut SqliteConnection,
        admin_id: i64,
        request: &BulkResetRequest,
    ) -> Result<BulkResetOutcome> {
        let mut items = Vec::with_capacity(request.targets.len());
        let mut touched_assessments = BTreeSet::new();

        for target in &request.targets {
            let outcome = self
                .bulk_item(conn, admin_id, target, request)
                .await
                .map_err(|e| {
                    tracing::error!(token = %target, error = %e, "bulk reset aborted");
                    e
                })?;
            match &outcome.status {
                BulkItemStatus::Succeeded => {
                    touched_assessments.insert(target.assessment_id);
                }
                BulkItemStatus::Skipped | BulkItemStatus::Failed => {
                    tracing::warn!(
                        token = %target,
                        status = ?outcome.status,
                        reason = outcome.reason.as_deref().unwrap_or_default(),
                        "bulk reset item not applied"
                    );
                }
            }
            items.push(outcome);
        }

        if request.enable_edit_mode {
            for assessment_id in &touched_assessments {
                enable_edit_mode(conn, *assessment_id).await?;
            }
        }

        let count = |status: BulkItemStatus| items.iter().filter(|i| i.status == status).count();
        let succeeded = count(BulkItemStatus::Succeeded);
        let skipped = count(BulkItemStatus::Skipped);
        let failed = count(BulkItemStatus::Failed);
        let reset_type = request.kind.reset_type();

        activity_service::log(
            conn,
            Some(admin_id),
            "bulk_reset_assessment",
            "assessment_attempt",
            None,
            Some(json!({
                "reset_type": reset_type,
                "reason": request.reason,
                "selected": request.targets.len(),
                "succeeded": succeeded,
                "skipped": skipped,
                "failed": failed,
            })),
        )
        .await?;

        Ok(BulkResetOutcome {
            message: format!(
                "Bulk {} reset completed: {} succeeded, {} skipped, {} failed.",
                reset_type, succeeded, skipped, failed
            ),
            succeeded,
            skipped,
            failed,
            items,
        })
    }

    async fn bulk_item(
        &self,
        conn: &mut SqliteConnection,
        admin_id: i64,
        target: &AttemptTarget,
        request: &BulkResetRequest,
    ) -> Result<BulkItemOutcome> {
        let not_applied = |status: BulkItemStatus, reason: String| BulkItemOutcome {
            token: target.to_string(),
            status,
            reason: Some(reason),
        };

        let claimed = claim_attempt(conn, target.attempt_id).await?;

        let reset_count = count_resets(conn, target.assessment_id, target.student_id).await?;
        if reset_count >= self.policy.max_resets_per_student {
            return Ok(not_applied(
                BulkItemStatus::Skipped,
                "Maximum resets reached".to_string(),
            ));
        }

        let attempt = match claimed {
            Some(attempt) if attempt.belongs_to(target.assessment_id, target.student_id) => {
                attempt
            }
            _ => {
                return Ok(not_applied(
                    BulkItemStatus::Skipped,
                    "Assessment attempt not found".to_string(),
                ))
            }
        };

        let Some(assessment) = find_assessment(conn, target.assessment_id).await? else {
            return Ok(not_applied(
                BulkItemStatus::Skipped,
                "Assessment not found".to_string(),
            ));
        };

        match self
            .apply(
                conn,
                admin_id,
                &attempt,
                &assessment,
                &request.kind,
                &request.reason,
                request.enable_edit_mode,
            )
            .await
        {
            Ok(_) => Ok(BulkItemOutcome {
                token: target.to_string(),
                status: BulkItemStatus::Succeeded,
                reason: None,
            }),
            Err(Error::TimeCalculation(reason)) => {
                Ok(not_applied(BulkItemStatus::Failed, reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Time calculation, audit row, metadata and attempt mutation. The time calculation
    /// runs before the first write, so a `TimeCalculation` error leaves nothing behind.
    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        admin_id: i64,
        attempt: &AssessmentAttempt,
        assessment: &Assessment,
        kind: &ResetKind,
        reason: &str,
        enable_edit_mode: bool,
    ) -> Result<AppliedReset> {
        let duration = assessment.duration_or(self.policy.default_duration_minutes);

        let allocation = match kind {
            ResetKind::Partial(adjustment) => Some(time_calculation::calculate(
                adjustment,
                duration,
                attempt.start_time,
            )?),
            ResetKind::Full => None,
        };

        let answered = count_answers(conn, attempt.assessment_id, attempt.user_id).await?;
        let reset_at = now();
        let reset_type = kind.reset_type();

        let reset_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO assessment_resets (
                assessment_id, user_id, reset_by, reset_type, reason,
                previous_status, previous_answers_count, reset_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(attempt.assessment_id)
        .bind(attempt.user_id)
        .bind(admin_id)
        .bind(reset_type.as_str())
        .bind(reason)
        .bind(&attempt.status)
        .bind(answered)
        .bind(reset_at)
        .fetch_one(&mut *conn)
        .await?;

        match allocation {
            None => {
                for table in ["student_answers", "results", "assessment_attempts"] {
                    sqlx::query(&format!(
                        "DELETE FROM {} WHERE assessment_id = ? AND user_id = ?",
                        table
                    ))
                    .bind(attempt.assessment_id)
                    .bind(attempt.user_id)
                    .execute(&mut *conn)
                    .await?;
                }
            }
            Some(allocation) => {
                let metadata = ResetMetadata {
                    original_duration: duration,
                    reset_type,
                    reset_timestamp: reset_at,
                    reset_by: admin_id,
                    reset_reason: reason.to_string(),
                    timer_started: false,
                    edit_mode_enabled: enable_edit_mode,
                    custom_duration_minutes: Some(allocation.remaining_minutes),
                    time_tracking: Some(allocation.time_tracking()),
                    reset_history: Vec::new(),
                }
                .carry_history_from(attempt.answer_metadata.as_deref());

                sqlx::query(
                    r#"
                    UPDATE assessment_attempts
                    SET status = ?, end_time = NULL, answer_metadata = ?
                    WHERE id = ?
                    "#,
                )
                .bind(STATUS_IN_PROGRESS)
                .bind(metadata.to_json_string()?)
                .bind(attempt.id)
                .execute(&mut *conn)
                .await?;

                sqlx::query("DELETE FROM results WHERE assessment_id = ? AND user_id = ?")
                    .bind(attempt.assessment_id)
                    .bind(attempt.user_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        Ok(AppliedReset {
            reset_id,
            allocation,
        })
    }

    pub async fn history(&self, assessment_id: i64, student_id: i64) -> Result<ResetHistory> {
        let resets = sqlx::query_as::<_, AssessmentReset>(
            r#"
            SELECT id, assessment_id, user_id, reset_by, reset_type, reason,
                   previous_status, previous_answers_count, reset_at
            FROM assessment_resets
            WHERE assessment_id = ? AND user_id = ?
            ORDER BY reset_at DESC, id DESC
            "#,
        )
        .bind(assessment_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let reset_count = resets.len() as i64;
        Ok(ResetHistory {
            assessment_id,
            student_id,
            reset_count,
            remaining_resets: (self.policy.max_resets_per_student - reset_count).max(0),
            resets,
        })
    }
}

async fn rollback(tx: Transaction<'_, Sqlite>, cause: &Error) {
    if cause.is_unexpected() {
        tracing::error!(error = %cause, "reset transaction rolled back");
    } else {
        tracing::warn!(error = %cause, "reset rejected");
    }
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed");
    }
}

/// Loads the attempt through a no-op write so the transaction holds the write lock
/// before the quota is counted; concurrent resets of the same attempt serialize here.
async fn claim_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Option<AssessmentAttempt>> {
    let attempt = sqlx::query_as::<_, AssessmentAttempt>(
        r#"
        UPDATE assessment_attempts SET status = status
        WHERE id = ?
        RETURNING id, assessment_id, user_id, start_time, end_time, status, answer_metadata
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(attempt)
}

async fn find_assessment(
    conn: &mut SqliteConnection,
    assessment_id: i64,
) -> Result<Option<Assessment>> {
    let assessment = sqlx::query_as::<_, Assessment>(
        r#"
        SELECT id, title, duration, allow_answer_editing, use_question_limit,
               questions_to_answer, created_at
        FROM assessments WHERE id = ?
        "#,
    )
    .bind(assessment_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(assessment)
}

async fn count_resets(
    conn: &mut SqliteConnection,
    assessment_id: i64,
    student_id: i64,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM assessment_resets WHERE assessment_id = ? AND user_id = ?",
    )
    .bind(assessment_id)
    .bind(student_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

async fn count_answers(
    conn: &mut SqliteConnection,
    assessment_id: i64,
    student_id: i64,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_answers WHERE assessment_id = ? AND user_id = ?",
    )
    .bind(assessment_id)
    .bind(student_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

async fn enable_edit_mode(conn: &mut SqliteConnection, assessment_id: i64) -> Result<()> {
    sqlx::query("UPDATE assessments SET allow_answer_editing = 1 WHERE id = ?")
        .bind(assessment_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
