//! Access rule persistence.
//!
//! The scope lives in nullable `campus`/`title` columns; generated
//! `campus_key`/`title_key` columns (wildcard = `'*'`) back the partial
//! unique index that enforces at most one non-deleted rule per scope.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use pax_core::domain::{Campus, Rule, Title};
use pax_core::error::StoreError;
use pax_core::scope::Scope;

use super::{is_unique_violation, parse_err, store_err};

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    campus: Option<String>,
    title: Option<String>,
    is_active: bool,
    is_deleted: bool,
    role_ids: Vec<Uuid>,
}

impl RuleRow {
    fn into_record(self) -> Result<Rule, StoreError> {
        let campus = self
            .campus
            .map(|c| c.parse::<Campus>())
            .transpose()
            .map_err(parse_err)?;
        let title = self
            .title
            .map(|t| t.parse::<Title>())
            .transpose()
            .map_err(parse_err)?;
        Ok(Rule {
            id: self.id,
            name: self.name,
            scope: Scope::new(campus, title),
            is_active: self.is_active,
            role_ids: self.role_ids,
            is_deleted: self.is_deleted,
        })
    }
}

const SELECT_RULE: &str = "SELECT r.id, r.name, r.campus, r.title, r.is_active, r.is_deleted,
            COALESCE(ARRAY_AGG(rr.role_id) FILTER (WHERE rr.role_id IS NOT NULL), '{}') AS role_ids
     FROM rules r
     LEFT JOIN rule_roles rr ON rr.rule_id = r.id";

async fn replace_roles(
    tx: &mut Transaction<'_, Postgres>,
    rule_id: Uuid,
    role_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM rule_roles WHERE rule_id = $1")
        .bind(rule_id)
        .execute(&mut **tx)
        .await?;
    for role_id in role_ids {
        sqlx::query("INSERT INTO rule_roles (rule_id, role_id) VALUES ($1, $2)")
            .bind(rule_id)
            .bind(role_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Insert a rule and its role set. A second non-deleted rule on the same
/// scope trips the partial unique index and maps to `DuplicateScope`.
pub async fn create(pool: &PgPool, rule: &Rule) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(store_err)?;

    let inserted = sqlx::query(
        "INSERT INTO rules (id, name, campus, title, is_active, is_deleted)
         VALUES ($1, $2, $3, $4, $5, FALSE)",
    )
    .bind(rule.id)
    .bind(&rule.name)
    .bind(rule.scope.campus.map(|c| c.as_str()))
    .bind(rule.scope.title.map(|t| t.as_str()))
    .bind(rule.is_active)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            let (campus, title) = rule.scope.storage_key();
            return Err(StoreError::DuplicateScope { campus, title });
        }
        return Err(store_err(e));
    }

    replace_roles(&mut tx, rule.id, &rule.role_ids)
        .await
        .map_err(store_err)?;
    tx.commit().await.map_err(store_err)
}

/// Replace a rule's name, scope, activity flag, and role set.
pub async fn update(pool: &PgPool, rule: &Rule) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(store_err)?;

    let done = sqlx::query(
        "UPDATE rules SET name = $2, campus = $3, title = $4, is_active = $5
         WHERE id = $1",
    )
    .bind(rule.id)
    .bind(&rule.name)
    .bind(rule.scope.campus.map(|c| c.as_str()))
    .bind(rule.scope.title.map(|t| t.as_str()))
    .bind(rule.is_active)
    .execute(&mut *tx)
    .await;

    match done {
        Ok(done) if done.rows_affected() == 0 => {
            return Err(StoreError::Backend(format!("rule not found: {}", rule.id)))
        }
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            let (campus, title) = rule.scope.storage_key();
            return Err(StoreError::DuplicateScope { campus, title });
        }
        Err(e) => return Err(store_err(e)),
    }

    replace_roles(&mut tx, rule.id, &rule.role_ids)
        .await
        .map_err(store_err)?;
    tx.commit().await.map_err(store_err)
}

/// Soft-delete a rule; the row and its role set remain for audit history.
pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let done = sqlx::query("UPDATE rules SET is_deleted = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(store_err)?;
    if done.rows_affected() == 0 {
        return Err(StoreError::Backend(format!("rule not found: {id}")));
    }
    Ok(())
}

/// Fetch a rule by id, deleted or not.
pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Rule>, StoreError> {
    let row: Option<RuleRow> = sqlx::query_as(&format!("{SELECT_RULE} WHERE r.id = $1 GROUP BY r.id"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(store_err)?;
    row.map(RuleRow::into_record).transpose()
}

/// All non-deleted rules.
pub async fn list(pool: &PgPool) -> Result<Vec<Rule>, StoreError> {
    let rows: Vec<RuleRow> =
        sqlx::query_as(&format!("{SELECT_RULE} WHERE NOT r.is_deleted GROUP BY r.id ORDER BY r.name"))
            .fetch_all(pool)
            .await
            .map_err(store_err)?;
    rows.into_iter().map(RuleRow::into_record).collect()
}

/// Active, non-deleted rules overlapping the scope (null-or-equal on both
/// dimensions), excluding `exclude` when given.
pub async fn active_overlapping(
    pool: &PgPool,
    scope: &Scope,
    exclude: Option<Uuid>,
) -> Result<Vec<Rule>, StoreError> {
    let rows: Vec<RuleRow> = sqlx::query_as(&format!(
        "{SELECT_RULE}
         WHERE NOT r.is_deleted AND r.is_active
           AND ($1::TEXT IS NULL OR r.campus IS NULL OR r.campus = $1)
           AND ($2::TEXT IS NULL OR r.title IS NULL OR r.title = $2)
           AND ($3::UUID IS NULL OR r.id <> $3)
         GROUP BY r.id"
    ))
    .bind(scope.campus.map(|c| c.as_str()))
    .bind(scope.title.map(|t| t.as_str()))
    .bind(exclude)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.into_iter().map(RuleRow::into_record).collect()
}

/// The non-deleted rule holding this exact scope storage key, if any.
pub async fn find_active_by_scope_key(
    pool: &PgPool,
    campus_key: &str,
    title_key: &str,
) -> Result<Option<Rule>, StoreError> {
    let row: Option<RuleRow> = sqlx::query_as(&format!(
        "{SELECT_RULE}
         WHERE NOT r.is_deleted AND r.campus_key = $1 AND r.title_key = $2
         GROUP BY r.id"
    ))
    .bind(campus_key)
    .bind(title_key)
    .fetch_optional(pool)
    .await
    .map_err(store_err)?;
    row.map(RuleRow::into_record).transpose()
}
