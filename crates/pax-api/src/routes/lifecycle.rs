//! # Lifecycle Event Intake API
//!
//! Direct HTTP ingestion of personnel lifecycle events, sharing the intake
//! handler with the relay-fed path. Field names mirror the source system's
//! wire format, `occuredAtUtc` spelling included.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use pax_batch::IntakeOutcome;
use pax_core::action::LifecycleEvent;

use crate::error::AppError;
use crate::state::AppState;

/// Inbound lifecycle event, in the source system's wire format.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LifecycleEventBody {
    /// Source-assigned event id; idempotency key.
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    /// `personnel.hired` or `personnel.terminated`.
    #[serde(rename = "eventType")]
    pub event_type: String,
    /// Employee number the event concerns.
    #[serde(rename = "employeeNo")]
    pub employee_no: String,
    /// Date the intent takes effect.
    #[serde(rename = "effectiveDate")]
    pub effective_date: NaiveDate,
    /// When the source system recorded the event.
    #[serde(rename = "occuredAtUtc")]
    pub occurred_at_utc: DateTime<Utc>,
    /// Correlation id threaded through the audit trail.
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
}

impl From<LifecycleEventBody> for LifecycleEvent {
    fn from(body: LifecycleEventBody) -> Self {
        Self {
            event_id: body.event_id,
            event_type: body.event_type,
            employee_no: body.employee_no,
            effective_date: body.effective_date,
            occurred_at_utc: body.occurred_at_utc,
            correlation_id: body.correlation_id,
        }
    }
}

/// What ingesting the event did.
#[derive(Debug, Serialize, ToSchema)]
pub struct IntakeResponse {
    /// The source event id.
    pub event_id: Uuid,
    /// `"scheduled"` or `"duplicate"`.
    pub outcome: &'static str,
}

/// Build the lifecycle router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events/lifecycle", post(ingest_event))
}

/// POST /v1/events/lifecycle — Ingest one lifecycle event.
#[utoipa::path(
    post,
    path = "/v1/events/lifecycle",
    request_body = LifecycleEventBody,
    responses(
        (status = 202, description = "Event accepted (scheduled or duplicate)", body = IntakeResponse),
        (status = 409, description = "A pending terminate intent already exists", body = crate::error::ErrorBody),
        (status = 422, description = "Unrecognized event type", body = crate::error::ErrorBody),
    ),
    tag = "lifecycle"
)]
pub(crate) async fn ingest_event(
    State(state): State<AppState>,
    Json(body): Json<LifecycleEventBody>,
) -> Result<(StatusCode, Json<IntakeResponse>), AppError> {
    let event: LifecycleEvent = body.into();
    let outcome = state.intake().ingest(&event).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(IntakeResponse {
            event_id: event.event_id,
            outcome: match outcome {
                IntakeOutcome::Scheduled => "scheduled",
                IntakeOutcome::Duplicate => "duplicate",
            },
        }),
    ))
}
