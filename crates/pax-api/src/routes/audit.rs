//! # Audit Trail API
//!
//! Read-only, paged listings over the three audit surfaces: propagation
//! events (with per-attempt logs), daily-processor jobs, and the relay log.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use pax_core::audit::{EventLogEntry, EventRecord, JobRecord, RelayLogEntry};
use pax_core::ports::Page;

use crate::error::AppError;
use crate::state::AppState;

/// Page query parameters; both optional.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Rows per page (default 50, capped at 200).
    pub per_page: Option<u32>,
}

impl PageParams {
    fn to_page(&self) -> Page {
        Page::new(self.page.unwrap_or(1), self.per_page.unwrap_or(50))
    }
}

/// One propagation event header.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub id: Uuid,
    pub event_type: String,
    pub source_id: Option<Uuid>,
    pub correlation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub total_count: u32,
    pub success_count: u32,
    pub fail_count: u32,
    pub is_completed: bool,
}

impl From<EventRecord> for EventResponse {
    fn from(e: EventRecord) -> Self {
        Self {
            id: e.id,
            event_type: e.event_type,
            source_id: e.source_id,
            correlation_id: e.correlation_id,
            occurred_at: e.occurred_at,
            total_count: e.total_count,
            success_count: e.success_count,
            fail_count: e.fail_count,
            is_completed: e.is_completed,
        }
    }
}

/// One (person, role) mutation attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventLogResponse {
    pub id: Uuid,
    pub employee_no: String,
    pub personnel_name: String,
    pub role_id: Uuid,
    pub role_name: String,
    /// `assigned` or `revoked`.
    pub action: String,
    /// `success` or `failed`.
    pub status: String,
    pub error: Option<String>,
}

impl From<EventLogEntry> for EventLogResponse {
    fn from(l: EventLogEntry) -> Self {
        Self {
            id: l.id,
            employee_no: l.employee_no,
            personnel_name: l.personnel_name,
            role_id: l.role_id,
            role_name: l.role_name,
            action: l.action.to_string(),
            status: l.status.to_string(),
            error: l.error,
        }
    }
}

/// One daily-processor job header.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub job_type: String,
    /// `running` or `completed`.
    pub status: String,
    pub total_count: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<JobRecord> for JobResponse {
    fn from(j: JobRecord) -> Self {
        Self {
            id: j.id,
            job_type: j.job_type,
            status: j.status.to_string(),
            total_count: j.total_count,
            success_count: j.success_count,
            failure_count: j.failure_count,
            started_at: j.started_at,
            finished_at: j.finished_at,
        }
    }
}

/// One relay disposition record.
#[derive(Debug, Serialize, ToSchema)]
pub struct RelayLogResponse {
    pub id: Uuid,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    /// `success`, `failed`, `poison`, or `unknown`.
    pub status: String,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<RelayLogEntry> for RelayLogResponse {
    fn from(r: RelayLogEntry) -> Self {
        Self {
            id: r.id,
            topic: r.topic,
            partition: r.partition,
            offset: r.offset,
            key: r.key,
            status: r.status.to_string(),
            error_message: r.error_message,
            retry_count: r.retry_count,
            created_at: r.created_at,
        }
    }
}

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit/events", get(list_events))
        .route("/v1/audit/events/:id/logs", get(event_logs))
        .route("/v1/audit/jobs", get(list_jobs))
        .route("/v1/relay/log", get(relay_log))
}

/// GET /v1/audit/events — Paged propagation event headers, newest first.
#[utoipa::path(
    get,
    path = "/v1/audit/events",
    params(PageParams),
    responses(
        (status = 200, description = "Event headers", body = [EventResponse]),
    ),
    tag = "audit"
)]
pub(crate) async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let events = state.audit.list_events(params.to_page()).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// GET /v1/audit/events/{id}/logs — All log rows of one event.
#[utoipa::path(
    get,
    path = "/v1/audit/events/{id}/logs",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Per-attempt log rows", body = [EventLogResponse]),
    ),
    tag = "audit"
)]
pub(crate) async fn event_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EventLogResponse>>, AppError> {
    let logs = state.audit.event_logs(id).await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

/// GET /v1/audit/jobs — Paged daily-processor job headers, newest first.
#[utoipa::path(
    get,
    path = "/v1/audit/jobs",
    params(PageParams),
    responses(
        (status = 200, description = "Job headers", body = [JobResponse]),
    ),
    tag = "audit"
)]
pub(crate) async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    let jobs = state.jobs.list_jobs(params.to_page()).await?;
    Ok(Json(jobs.into_iter().map(Into::into).collect()))
}

/// GET /v1/relay/log — Paged relay dispositions, newest first.
#[utoipa::path(
    get,
    path = "/v1/relay/log",
    params(PageParams),
    responses(
        (status = 200, description = "Relay log records", body = [RelayLogResponse]),
    ),
    tag = "audit"
)]
pub(crate) async fn relay_log(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<RelayLogResponse>>, AppError> {
    let entries = state.relay_audit.list(params.to_page()).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
