pub mod health;
pub mod reset;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{middleware::auth::require_admin, AppState};

pub fn create_router(state: AppState) -> Router {
    let admin_api = Router::new()
        .route(
            "/api/admin/assessment-attempts",
            get(reset::list_attempts),
        )
        .route(
            "/api/admin/assessment-attempts/filters",
            get(reset::get_filter_options),
        )
        .route(
            "/api/admin/assessment-resets",
            get(reset::get_reset_history).post(reset::reset_assessment),
        )
        .route(
            "/api/admin/assessment-resets/bulk",
            post(reset::bulk_reset),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(admin_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
