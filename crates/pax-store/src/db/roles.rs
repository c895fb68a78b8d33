//! Role catalog persistence.

use sqlx::PgPool;
use uuid::Uuid;

use pax_core::domain::Role;
use pax_core::error::StoreError;

use super::store_err;

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
}

impl RoleRow {
    fn into_record(self) -> Role {
        Role {
            id: self.id,
            name: self.name,
        }
    }
}

/// Fetch a role by id.
pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Role>, StoreError> {
    let row: Option<RoleRow> = sqlx::query_as("SELECT id, name FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(store_err)?;
    Ok(row.map(RoleRow::into_record))
}

/// All roles, by name.
pub async fn list(pool: &PgPool) -> Result<Vec<Role>, StoreError> {
    let rows: Vec<RoleRow> = sqlx::query_as("SELECT id, name FROM roles ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(store_err)?;
    Ok(rows.into_iter().map(RoleRow::into_record).collect())
}
