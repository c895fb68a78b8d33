//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PAX API — Personnel Access eXchange",
        version = "0.3.2",
        description = "Access-rule lifecycle, personnel lifecycle-event intake, scheduled-action processing, and audit trails.",
        license(name = "BUSL-1.1")
    ),
    paths(
        // Rules
        crate::routes::rules::create_rule,
        crate::routes::rules::list_rules,
        crate::routes::rules::get_rule,
        crate::routes::rules::update_rule,
        crate::routes::rules::delete_rule,
        // Lifecycle intake
        crate::routes::lifecycle::ingest_event,
        // Admin
        crate::routes::admin::run_scheduled,
        // Audit
        crate::routes::audit::list_events,
        crate::routes::audit::event_logs,
        crate::routes::audit::list_jobs,
        crate::routes::audit::relay_log,
    ),
    components(schemas(
        crate::routes::rules::RuleBody,
        crate::routes::rules::RuleResponse,
        crate::routes::rules::PropagationReport,
        crate::routes::rules::RuleMutationResponse,
        crate::routes::rules::RuleDeletionResponse,
        crate::routes::lifecycle::LifecycleEventBody,
        crate::routes::lifecycle::IntakeResponse,
        crate::routes::admin::RunRequest,
        crate::routes::admin::RunReport,
        crate::routes::audit::EventResponse,
        crate::routes::audit::EventLogResponse,
        crate::routes::audit::JobResponse,
        crate::routes::audit::RelayLogResponse,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "rules", description = "Access-rule lifecycle"),
        (name = "lifecycle", description = "Personnel lifecycle-event intake"),
        (name = "admin", description = "Operational triggers"),
        (name = "audit", description = "Read-only audit trails"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_spec))
}

async fn serve_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
