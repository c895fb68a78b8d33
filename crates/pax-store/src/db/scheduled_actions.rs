//! Scheduled-action persistence.
//!
//! `seq` is a database identity column: arrival order is assigned at insert
//! and used as the tie-breaker when actions share an effective date.
//! `external_event_id` is unique, which is what makes intake idempotent.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pax_core::action::{ActionStatus, ActionType, NewScheduledAction, ScheduledAction};
use pax_core::error::StoreError;

use super::{is_unique_violation, parse_err, store_err};

#[derive(sqlx::FromRow)]
struct ActionRow {
    id: Uuid,
    seq: i64,
    external_event_id: Uuid,
    employee_no: String,
    action_type: String,
    effective_date: NaiveDate,
    status: String,
    correlation_id: Uuid,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl ActionRow {
    fn into_record(self) -> Result<ScheduledAction, StoreError> {
        Ok(ScheduledAction {
            id: self.id,
            seq: self.seq,
            external_event_id: self.external_event_id,
            employee_no: self.employee_no,
            action_type: self.action_type.parse::<ActionType>().map_err(parse_err)?,
            effective_date: self.effective_date,
            status: self.status.parse::<ActionStatus>().map_err(parse_err)?,
            correlation_id: self.correlation_id,
            created_at: self.created_at,
            processed_at: self.processed_at,
        })
    }
}

const SELECT_ACTION: &str = "SELECT id, seq, external_event_id, employee_no, action_type,
            effective_date, status, correlation_id, created_at, processed_at
     FROM scheduled_actions";

/// Insert unless the event id was seen before. Returns `true` when a row
/// was created.
pub async fn insert_if_absent(
    pool: &PgPool,
    action: &NewScheduledAction,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "INSERT INTO scheduled_actions
             (id, external_event_id, employee_no, action_type, effective_date,
              status, correlation_id)
         VALUES ($1, $2, $3, $4, $5, 'pending', $6)",
    )
    .bind(Uuid::new_v4())
    .bind(action.external_event_id)
    .bind(&action.employee_no)
    .bind(action.action_type.as_str())
    .bind(action.effective_date)
    .bind(action.correlation_id)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(store_err(e)),
    }
}

/// Whether a pending terminate intent exists for the employee.
pub async fn has_pending_terminate(pool: &PgPool, employee_no: &str) -> Result<bool, StoreError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scheduled_actions
         WHERE employee_no = $1 AND status = 'pending' AND action_type = 'terminate'",
    )
    .bind(employee_no)
    .fetch_one(pool)
    .await
    .map_err(store_err)?;
    Ok(count > 0)
}

/// All pending actions due on `today`: hires on or before their effective
/// date, terminations strictly after it.
pub async fn due_actions(pool: &PgPool, today: NaiveDate) -> Result<Vec<ScheduledAction>, StoreError> {
    let rows: Vec<ActionRow> = sqlx::query_as(&format!(
        "{SELECT_ACTION}
         WHERE status = 'pending'
           AND ((action_type = 'hire' AND effective_date <= $1)
             OR (action_type = 'terminate' AND effective_date < $1))
         ORDER BY effective_date, seq"
    ))
    .bind(today)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.into_iter().map(ActionRow::into_record).collect()
}

/// Re-fetch an action's current state.
pub async fn reload(pool: &PgPool, id: Uuid) -> Result<Option<ScheduledAction>, StoreError> {
    let row: Option<ActionRow> = sqlx::query_as(&format!("{SELECT_ACTION} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(store_err)?;
    row.map(ActionRow::into_record).transpose()
}

/// Transition `pending → completed`, stamping `processed_at`.
pub async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    processed_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let done = sqlx::query(
        "UPDATE scheduled_actions SET status = 'completed', processed_at = $2
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .bind(processed_at)
    .execute(pool)
    .await
    .map_err(store_err)?;
    if done.rows_affected() == 0 {
        return Err(StoreError::Backend(format!(
            "scheduled action not pending: {id}"
        )));
    }
    Ok(())
}
