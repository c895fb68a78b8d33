//! # Database Layer
//!
//! Per-table modules of free async functions taking a `&PgPool`. The API
//! binary runs with or without a database: when `DATABASE_URL` is absent the
//! stack falls back to in-memory stores and nothing here is called.

pub mod events;
pub mod jobs;
pub mod outbox;
pub mod personnel;
pub mod relay_log;
pub mod roles;
pub mod rules;
pub mod scheduled_actions;

use pax_core::error::{EnumParseError, StoreError};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the connection pool and run embedded migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Map a sqlx error into the port error taxonomy. Connectivity problems are
/// `Unavailable` (retryable); everything else is `Backend`.
pub(crate) fn store_err(e: sqlx::Error) -> StoreError {
    match e {
        e @ (sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed) => StoreError::Unavailable(e.to_string()),
        e => StoreError::Backend(e.to_string()),
    }
}

/// A stored enum value that no longer parses is a data problem, not a
/// caller problem.
pub(crate) fn parse_err(e: EnumParseError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Whether the error is a unique-constraint violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Whether the error is a foreign-key violation (SQLSTATE 23503).
pub(crate) fn is_fk_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}
