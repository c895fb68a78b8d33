//! Daily-processor audit persistence: job headers and their log rows.
//!
//! Finalization recomputes the success/failure counters from the written
//! log rows in SQL, so a crash between log append and counter update can
//! never leave the header claiming counts the logs do not back.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pax_core::audit::{JobLogEntry, JobRecord, JobStatus, LogStatus};
use pax_core::error::StoreError;
use pax_core::ports::Page;

use super::{parse_err, store_err};

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    job_type: String,
    status: String,
    total_count: i32,
    success_count: i32,
    failure_count: i32,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord, StoreError> {
        Ok(JobRecord {
            id: self.id,
            job_type: self.job_type,
            status: self.status.parse::<JobStatus>().map_err(parse_err)?,
            total_count: self.total_count.max(0) as u32,
            success_count: self.success_count.max(0) as u32,
            failure_count: self.failure_count.max(0) as u32,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

/// Persist a freshly opened job header.
pub async fn open_job(pool: &PgPool, job: &JobRecord) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO jobs (id, job_type, status, total_count, success_count,
                           failure_count, started_at)
         VALUES ($1, $2, $3, $4, 0, 0, $5)",
    )
    .bind(job.id)
    .bind(&job.job_type)
    .bind(job.status.as_str())
    .bind(job.total_count as i32)
    .bind(job.started_at)
    .execute(pool)
    .await
    .map_err(store_err)?;
    Ok(())
}

/// Append one job log row.
pub async fn append_job_log(pool: &PgPool, log: &JobLogEntry) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO job_logs (id, job_id, message, status, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(log.id)
    .bind(log.job_id)
    .bind(&log.message)
    .bind(log.status.as_str())
    .bind(log.created_at)
    .execute(pool)
    .await
    .map_err(store_err)?;
    Ok(())
}

/// Finalize the job: recompute counts from the written logs and mark it
/// completed. Returns `(success_count, failure_count)`.
pub async fn finalize_job(pool: &PgPool, id: Uuid) -> Result<(u32, u32), StoreError> {
    let row: Option<(i32, i32)> = sqlx::query_as(
        "UPDATE jobs
         SET status = 'completed',
             finished_at = NOW(),
             success_count = counted.successes,
             failure_count = counted.failures
         FROM (SELECT COUNT(*) FILTER (WHERE status = $2)::INT AS successes,
                      COUNT(*) FILTER (WHERE status = $3)::INT AS failures
               FROM job_logs WHERE job_id = $1) AS counted
         WHERE jobs.id = $1
         RETURNING counted.successes, counted.failures",
    )
    .bind(id)
    .bind(LogStatus::Success.as_str())
    .bind(LogStatus::Failed.as_str())
    .fetch_optional(pool)
    .await
    .map_err(store_err)?;

    match row {
        Some((success, failure)) => Ok((success.max(0) as u32, failure.max(0) as u32)),
        None => Err(StoreError::Backend(format!("job not found: {id}"))),
    }
}

/// Paged job headers, newest first.
pub async fn list_jobs(pool: &PgPool, page: Page) -> Result<Vec<JobRecord>, StoreError> {
    let rows: Vec<JobRow> = sqlx::query_as(
        "SELECT id, job_type, status, total_count, success_count, failure_count,
                started_at, finished_at
         FROM jobs ORDER BY started_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(page.limit() as i64)
    .bind(page.offset() as i64)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.into_iter().map(JobRow::into_record).collect()
}
