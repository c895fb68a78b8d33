//! # Admin API
//!
//! Manual trigger for the daily scheduled-action processor. In production
//! the run fires from a cron schedule; this endpoint exists for operators
//! and for backfilling after an outage.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use pax_batch::RunSummary;

use crate::error::AppError;
use crate::state::AppState;

/// Optional run parameters.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RunRequest {
    /// Run date; defaults to today (UTC).
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Counters of one daily run.
#[derive(Debug, Serialize, ToSchema)]
pub struct RunReport {
    /// The Job audit header the run wrote.
    pub job_id: Uuid,
    /// Actions selected for the run.
    pub total: u32,
    /// Actions that completed.
    pub success: u32,
    /// Actions that failed and remain pending.
    pub failure: u32,
}

impl From<RunSummary> for RunReport {
    fn from(summary: RunSummary) -> Self {
        Self {
            job_id: summary.job_id,
            total: summary.total,
            success: summary.success,
            failure: summary.failure,
        }
    }
}

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/admin/run-scheduled", post(run_scheduled))
}

/// POST /v1/admin/run-scheduled — Run the daily processor now.
#[utoipa::path(
    post,
    path = "/v1/admin/run-scheduled",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Run finished", body = RunReport),
    ),
    tag = "admin"
)]
pub(crate) async fn run_scheduled(
    State(state): State<AppState>,
    body: Option<Json<RunRequest>>,
) -> Result<Json<RunReport>, AppError> {
    let date = body
        .and_then(|Json(req)| req.date)
        .unwrap_or_else(|| Utc::now().date_naive());
    let summary = state.processor().run_daily(date).await?;
    Ok(Json(summary.into()))
}
