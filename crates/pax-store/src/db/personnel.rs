//! Personnel directory persistence: scope queries and role mutations.
//!
//! Role membership lives in the `personnel_roles` join table. Its foreign
//! key to `roles` is `ON DELETE RESTRICT`, so granting a role that was
//! deleted out from under a rule fails at the constraint and surfaces as
//! `RoleNotFound`.

use sqlx::PgPool;
use uuid::Uuid;

use pax_core::domain::{Campus, Personnel, Title};
use pax_core::error::StoreError;
use pax_core::ports::{MutationOutcome, PersonnelRef};
use pax_core::scope::Scope;

use super::{is_fk_violation, parse_err, store_err};

/// Database row for personnel, with the role ids aggregated in.
#[derive(sqlx::FromRow)]
struct PersonnelRow {
    id: Uuid,
    employee_no: String,
    full_name: String,
    campus: String,
    title: String,
    is_deleted: bool,
    role_ids: Vec<Uuid>,
}

impl PersonnelRow {
    fn into_record(self) -> Result<Personnel, StoreError> {
        Ok(Personnel {
            id: self.id,
            employee_no: self.employee_no,
            full_name: self.full_name,
            campus: self.campus.parse::<Campus>().map_err(parse_err)?,
            title: self.title.parse::<Title>().map_err(parse_err)?,
            role_ids: self.role_ids,
            is_deleted: self.is_deleted,
        })
    }
}

fn scope_binds(scope: &Scope) -> (Option<&'static str>, Option<&'static str>) {
    (
        scope.campus.map(|c| c.as_str()),
        scope.title.map(|t| t.as_str()),
    )
}

/// Count non-deleted personnel matching the scope.
pub async fn count_matching(pool: &PgPool, scope: &Scope) -> Result<u64, StoreError> {
    let (campus, title) = scope_binds(scope);
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM personnel
         WHERE NOT is_deleted
           AND ($1::TEXT IS NULL OR campus = $1)
           AND ($2::TEXT IS NULL OR title = $2)",
    )
    .bind(campus)
    .bind(title)
    .fetch_one(pool)
    .await
    .map_err(store_err)?;
    Ok(count as u64)
}

/// One page of matching personnel in ascending `employee_no` order,
/// strictly after the cursor when given.
pub async fn page_matching(
    pool: &PgPool,
    scope: &Scope,
    after: Option<&str>,
    limit: u32,
) -> Result<Vec<PersonnelRef>, StoreError> {
    let (campus, title) = scope_binds(scope);
    let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
        "SELECT id, employee_no, full_name FROM personnel
         WHERE NOT is_deleted
           AND ($1::TEXT IS NULL OR campus = $1)
           AND ($2::TEXT IS NULL OR title = $2)
           AND ($3::TEXT IS NULL OR employee_no > $3)
         ORDER BY employee_no ASC
         LIMIT $4",
    )
    .bind(campus)
    .bind(title)
    .bind(after)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await
    .map_err(store_err)?;

    Ok(rows
        .into_iter()
        .map(|(id, employee_no, full_name)| PersonnelRef {
            id,
            employee_no,
            full_name,
        })
        .collect())
}

/// Look up a non-deleted person by employee number, roles included.
pub async fn find_by_employee_no(
    pool: &PgPool,
    employee_no: &str,
) -> Result<Option<Personnel>, StoreError> {
    let row: Option<PersonnelRow> = sqlx::query_as(
        "SELECT p.id, p.employee_no, p.full_name, p.campus, p.title, p.is_deleted,
                COALESCE(ARRAY_AGG(pr.role_id) FILTER (WHERE pr.role_id IS NOT NULL), '{}') AS role_ids
         FROM personnel p
         LEFT JOIN personnel_roles pr ON pr.personnel_id = p.id
         WHERE p.employee_no = $1 AND NOT p.is_deleted
         GROUP BY p.id",
    )
    .bind(employee_no)
    .fetch_optional(pool)
    .await
    .map_err(store_err)?;

    row.map(PersonnelRow::into_record).transpose()
}

async fn ensure_person(pool: &PgPool, personnel_id: Uuid) -> Result<(), StoreError> {
    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM personnel WHERE id = $1 AND NOT is_deleted")
            .bind(personnel_id)
            .fetch_optional(pool)
            .await
            .map_err(store_err)?;
    if exists.is_none() {
        return Err(StoreError::PersonnelNotFound(personnel_id.to_string()));
    }
    Ok(())
}

/// Grant a role. Idempotent via `ON CONFLICT DO NOTHING`; a missing role
/// trips the restrict FK and maps to `RoleNotFound`.
pub async fn assign_role(
    pool: &PgPool,
    personnel_id: Uuid,
    role_id: Uuid,
) -> Result<MutationOutcome, StoreError> {
    ensure_person(pool, personnel_id).await?;

    let result = sqlx::query(
        "INSERT INTO personnel_roles (personnel_id, role_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(personnel_id)
    .bind(role_id)
    .execute(pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Ok(MutationOutcome::AlreadyInState),
        Ok(_) => Ok(MutationOutcome::Applied),
        Err(e) if is_fk_violation(&e) => Err(StoreError::RoleNotFound(role_id)),
        Err(e) => Err(store_err(e)),
    }
}

/// Remove a role. Idempotent: removing a role not held reports
/// `AlreadyInState`.
pub async fn revoke_role(
    pool: &PgPool,
    personnel_id: Uuid,
    role_id: Uuid,
) -> Result<MutationOutcome, StoreError> {
    ensure_person(pool, personnel_id).await?;

    let done = sqlx::query("DELETE FROM personnel_roles WHERE personnel_id = $1 AND role_id = $2")
        .bind(personnel_id)
        .bind(role_id)
        .execute(pool)
        .await
        .map_err(store_err)?;

    if done.rows_affected() == 0 {
        Ok(MutationOutcome::AlreadyInState)
    } else {
        Ok(MutationOutcome::Applied)
    }
}

/// Terminate handling: clear every role and soft-delete, in one transaction.
pub async fn clear_roles_and_retire(pool: &PgPool, personnel_id: Uuid) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(store_err)?;

    sqlx::query("DELETE FROM personnel_roles WHERE personnel_id = $1")
        .bind(personnel_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

    let done = sqlx::query("UPDATE personnel SET is_deleted = TRUE WHERE id = $1")
        .bind(personnel_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;
    if done.rows_affected() == 0 {
        return Err(StoreError::PersonnelNotFound(personnel_id.to_string()));
    }

    tx.commit().await.map_err(store_err)
}

/// Distinct `(campus, title)` pairs with at least one non-deleted person.
pub async fn occupied_groups(pool: &PgPool) -> Result<Vec<(Campus, Title)>, StoreError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT DISTINCT campus, title FROM personnel
         WHERE NOT is_deleted
         ORDER BY campus, title",
    )
    .fetch_all(pool)
    .await
    .map_err(store_err)?;

    rows.into_iter()
        .map(|(campus, title)| {
            Ok((
                campus.parse::<Campus>().map_err(parse_err)?,
                title.parse::<Title>().map_err(parse_err)?,
            ))
        })
        .collect()
}
