//! Transactional outbox persistence.
//!
//! The relay only ever inserts; `dispatched_at`, `attempts`, and
//! `last_error` belong to the external sweeper that drains the table.

use sqlx::{PgExecutor, PgPool};

use pax_core::audit::{OutboxMessage, RelayLogEntry};
use pax_core::error::StoreError;

use super::store_err;

/// Stage a message and its relay-log row in one transaction. A crash
/// between the two writes can never leave a forwarded message without its
/// audit row.
pub async fn forward(
    pool: &PgPool,
    message: &OutboxMessage,
    log: &RelayLogEntry,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(store_err)?;
    insert(&mut *tx, message).await?;
    super::relay_log::insert(&mut *tx, log).await?;
    tx.commit().await.map_err(store_err)
}

async fn insert<'e>(exec: impl PgExecutor<'e>, message: &OutboxMessage) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO outbox (id, topic, msg_key, payload, published_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(message.id)
    .bind(&message.topic)
    .bind(&message.key)
    .bind(&message.payload)
    .bind(message.published_at)
    .execute(exec)
    .await
    .map_err(store_err)?;
    Ok(())
}
