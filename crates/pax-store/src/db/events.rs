//! Propagation audit persistence: event headers and their log rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pax_core::audit::{EventLogEntry, EventRecord, EventTotals, GrantAction, LogStatus};
use pax_core::error::StoreError;
use pax_core::ports::Page;

use super::{parse_err, store_err};

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    event_type: String,
    source_id: Option<Uuid>,
    correlation_id: Uuid,
    occurred_at: DateTime<Utc>,
    total_count: i32,
    success_count: i32,
    fail_count: i32,
    is_completed: bool,
}

impl EventRow {
    fn into_record(self) -> EventRecord {
        EventRecord {
            id: self.id,
            event_type: self.event_type,
            source_id: self.source_id,
            correlation_id: self.correlation_id,
            occurred_at: self.occurred_at,
            total_count: self.total_count.max(0) as u32,
            success_count: self.success_count.max(0) as u32,
            fail_count: self.fail_count.max(0) as u32,
            is_completed: self.is_completed,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventLogRow {
    id: Uuid,
    event_id: Uuid,
    employee_no: String,
    personnel_name: String,
    role_id: Uuid,
    role_name: String,
    action: String,
    status: String,
    error: Option<String>,
}

impl EventLogRow {
    fn into_record(self) -> Result<EventLogEntry, StoreError> {
        Ok(EventLogEntry {
            id: self.id,
            event_id: self.event_id,
            employee_no: self.employee_no,
            personnel_name: self.personnel_name,
            role_id: self.role_id,
            role_name: self.role_name,
            action: self.action.parse::<GrantAction>().map_err(parse_err)?,
            status: self.status.parse::<LogStatus>().map_err(parse_err)?,
            error: self.error,
        })
    }
}

/// Persist a freshly opened event header.
pub async fn open_event(pool: &PgPool, event: &EventRecord) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO events (id, event_type, source_id, correlation_id, occurred_at,
                             total_count, success_count, fail_count, is_completed)
         VALUES ($1, $2, $3, $4, $5, $6, 0, 0, FALSE)",
    )
    .bind(event.id)
    .bind(&event.event_type)
    .bind(event.source_id)
    .bind(event.correlation_id)
    .bind(event.occurred_at)
    .bind(event.total_count as i32)
    .execute(pool)
    .await
    .map_err(store_err)?;
    Ok(())
}

/// Append a page of log rows in one transaction.
pub async fn append_event_logs(pool: &PgPool, logs: &[EventLogEntry]) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(store_err)?;
    for log in logs {
        sqlx::query(
            "INSERT INTO event_logs (id, event_id, employee_no, personnel_name,
                                     role_id, role_name, action, status, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(log.id)
        .bind(log.event_id)
        .bind(&log.employee_no)
        .bind(&log.personnel_name)
        .bind(log.role_id)
        .bind(&log.role_name)
        .bind(log.action.as_str())
        .bind(log.status.as_str())
        .bind(&log.error)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;
    }
    tx.commit().await.map_err(store_err)
}

/// Write the final counters and mark the header completed.
pub async fn finalize_event(pool: &PgPool, id: Uuid, totals: EventTotals) -> Result<(), StoreError> {
    let done = sqlx::query(
        "UPDATE events
         SET total_count = $2, success_count = $3, fail_count = $4, is_completed = TRUE
         WHERE id = $1",
    )
    .bind(id)
    .bind(totals.total as i32)
    .bind(totals.success as i32)
    .bind(totals.fail as i32)
    .execute(pool)
    .await
    .map_err(store_err)?;
    if done.rows_affected() == 0 {
        return Err(StoreError::Backend(format!("event not found: {id}")));
    }
    Ok(())
}

/// Paged event headers, newest first.
pub async fn list_events(pool: &PgPool, page: Page) -> Result<Vec<EventRecord>, StoreError> {
    let rows: Vec<EventRow> = sqlx::query_as(
        "SELECT id, event_type, source_id, correlation_id, occurred_at,
                total_count, success_count, fail_count, is_completed
         FROM events ORDER BY occurred_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(page.limit() as i64)
    .bind(page.offset() as i64)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    Ok(rows.into_iter().map(EventRow::into_record).collect())
}

/// All log rows of one event.
pub async fn event_logs(pool: &PgPool, event_id: Uuid) -> Result<Vec<EventLogEntry>, StoreError> {
    let rows: Vec<EventLogRow> = sqlx::query_as(
        "SELECT id, event_id, employee_no, personnel_name, role_id, role_name,
                action, status, error
         FROM event_logs WHERE event_id = $1
         ORDER BY employee_no, role_id",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.into_iter().map(EventLogRow::into_record).collect()
}
