use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};

use crate::{
    dto::reset_dto::{
        AttemptListQuery, AttemptListResponse, BulkResetPayload, ResetAssessmentPayload,
        ResetHistoryQuery,
    },
    error::Result,
    middleware::auth::AdminIdentity,
    models::reset_request::{BulkResetRequest, ResetRequest},
    services::attempt_listing_service::{AttemptFilter, FilterOptions},
    services::reset_service::{BulkResetOutcome, ResetHistory, ResetOutcome},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/assessment-attempts",
    params(
        ("search" = Option<String>, Query, description = "Student name or username"),
        ("assessment_id" = Option<i64>, Query, description = "Filter by assessment"),
        ("status" = Option<String>, Query, description = "Filter by attempt status"),
        ("class_id" = Option<i64>, Query, description = "Filter by class")
    ),
    responses(
        (status = 200, description = "Most recently started attempts", body = Json<AttemptListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Query(query): Query<AttemptListQuery>,
) -> Result<impl IntoResponse> {
    let filter = AttemptFilter::from(query);
    let items = state.listing_service.list(&filter).await?;
    Ok(Json(AttemptListResponse {
        total: items.len(),
        items,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/assessment-attempts/filters",
    responses(
        (status = 200, description = "Assessments, classes and statuses for the listing filters", body = Json<FilterOptions>)
    )
)]
#[axum::debug_handler]
pub async fn get_filter_options(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let options = state.listing_service.filter_options().await?;
    Ok(Json(options))
}

#[utoipa::path(
    post,
    path = "/api/admin/assessment-resets",
    request_body = ResetAssessmentPayload,
    responses(
        (status = 200, description = "Attempt reset", body = Json<ResetOutcome>),
        (status = 400, description = "Invalid reset request"),
        (status = 404, description = "Assessment or attempt not found"),
        (status = 409, description = "Maximum resets reached for this student"),
        (status = 422, description = "Time inputs inconsistent with the attempt"),
    )
)]
#[axum::debug_handler]
pub async fn reset_assessment(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Json(payload): Json<ResetAssessmentPayload>,
) -> Result<Json<ResetOutcome>> {
    let request = ResetRequest::try_from(payload)?;
    let outcome = state.reset_service.reset(admin.admin_id, &request).await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/admin/assessment-resets/bulk",
    request_body = BulkResetPayload,
    responses(
        (status = 200, description = "Bulk reset applied; see per-item outcomes", body = Json<BulkResetOutcome>),
        (status = 400, description = "Invalid bulk reset request"),
        (status = 500, description = "Bulk reset rolled back"),
    )
)]
#[axum::debug_handler]
pub async fn bulk_reset(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Json(payload): Json<BulkResetPayload>,
) -> Result<Json<BulkResetOutcome>> {
    let request = BulkResetRequest::try_from(payload)?;
    let outcome = state
        .reset_service
        .bulk_reset(admin.admin_id, &request)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/admin/assessment-resets",
    params(
        ("assessment_id" = i64, Query, description = "Assessment ID"),
        ("student_id" = i64, Query, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Resets for the pair, newest first", body = Json<ResetHistory>)
    )
)]
#[axum::debug_handler]
pub async fn get_reset_history(
    State(state): State<AppState>,
    Query(query): Query<ResetHistoryQuery>,
) -> Result<impl IntoResponse> {
    let history = state
        .reset_service
        .history(query.assessment_id, query.student_id)
        .await?;
    Ok(Json(history))
}
