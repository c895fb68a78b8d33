//! Relay observability log persistence. Write-once rows, one per inbound
//! message.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use pax_core::audit::{RelayLogEntry, RelayStatus};
use pax_core::error::StoreError;
use pax_core::ports::Page;

use super::{parse_err, store_err};

#[derive(sqlx::FromRow)]
struct RelayLogRow {
    id: Uuid,
    topic: String,
    source_partition: i32,
    source_offset: i64,
    msg_key: Option<String>,
    msg_value: Option<String>,
    status: String,
    error_message: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
}

impl RelayLogRow {
    fn into_record(self) -> Result<RelayLogEntry, StoreError> {
        Ok(RelayLogEntry {
            id: self.id,
            topic: self.topic,
            partition: self.source_partition,
            offset: self.source_offset,
            key: self.msg_key,
            value: self.msg_value,
            status: self.status.parse::<RelayStatus>().map_err(parse_err)?,
            error_message: self.error_message,
            retry_count: self.retry_count,
            created_at: self.created_at,
        })
    }
}

/// Record one inbound message's disposition.
pub async fn record(pool: &PgPool, entry: &RelayLogEntry) -> Result<(), StoreError> {
    insert(pool, entry).await
}

/// Insert the log row on any executor, so the outbox forward can write it
/// inside its own transaction.
pub(super) async fn insert<'e>(
    exec: impl PgExecutor<'e>,
    entry: &RelayLogEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO relay_log (id, topic, source_partition, source_offset, msg_key,
                                msg_value, status, error_message, retry_count, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(entry.id)
    .bind(&entry.topic)
    .bind(entry.partition)
    .bind(entry.offset)
    .bind(&entry.key)
    .bind(&entry.value)
    .bind(entry.status.as_str())
    .bind(&entry.error_message)
    .bind(entry.retry_count)
    .bind(entry.created_at)
    .execute(exec)
    .await
    .map_err(store_err)?;
    Ok(())
}

/// Paged relay log, newest first.
pub async fn list(pool: &PgPool, page: Page) -> Result<Vec<RelayLogEntry>, StoreError> {
    let rows: Vec<RelayLogRow> = sqlx::query_as(
        "SELECT id, topic, source_partition, source_offset, msg_key, msg_value,
                status, error_message, retry_count, created_at
         FROM relay_log ORDER BY created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(page.limit() as i64)
    .bind(page.offset() as i64)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.into_iter().map(RelayLogRow::into_record).collect()
}
