//! Role repository.
//!
//! Roles are always returned with their permissions resolved, so they can be
//! flattened into session claims without further lookups.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};

use tablewise_core::{Permission, PermissionId, PermissionRef, Role, RoleId};

use super::permissions::PermissionRow;
use super::{RepositoryError, conflict_on_unique};

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: i32,
    name: String,
    is_active: bool,
    is_system: bool,
}

const ROLE_COLUMNS: &str = "id, name, is_active, is_system";

#[derive(Debug, sqlx::FromRow)]
struct RolePermissionRow {
    role_id: i32,
    #[sqlx(flatten)]
    permission: PermissionRow,
}

/// Fields of a new role.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub permissions: Vec<PermissionId>,
    pub is_active: bool,
    /// Only set when bootstrapping the Administrator role.
    pub system: bool,
}

/// Partial update of a role. `None` leaves the field unchanged;
/// `permissions` replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub name: Option<String>,
    pub permissions: Option<Vec<PermissionId>>,
    pub is_active: Option<bool>,
}

/// Repository for roles.
pub struct RoleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RoleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all roles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self) -> Result<Vec<Role>, RepositoryError> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM app.role ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        self.resolve(rows).await
    }

    /// Get a role by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: RoleId) -> Result<Option<Role>, RepositoryError> {
        Ok(self.get_many(&[id]).await?.pop())
    }

    /// Get the system Administrator role, whatever it is named now.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_system(&self) -> Result<Option<Role>, RepositoryError> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM app.role WHERE is_system"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(self.resolve(rows).await?.pop())
    }

    /// Get several roles by ID, ordered by name. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_many(&self, ids: &[RoleId]) -> Result<Vec<Role>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(RoleId::as_i32).collect();
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM app.role WHERE id = ANY($1) ORDER BY name"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        self.resolve(rows).await
    }

    /// Create a role with its permission set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken or a
    /// permission does not exist.
    pub async fn create(&self, new: &NewRole) -> Result<Role, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            r"
            INSERT INTO app.role (name, is_active, is_system)
            VALUES ($1, $2, $3)
            RETURNING {ROLE_COLUMNS}
            "
        ))
        .bind(&new.name)
        .bind(new.is_active)
        .bind(new.system)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique("role name already exists"))?;

        replace_permissions(&mut tx, RoleId::new(row.id), &new.permissions).await?;
        tx.commit().await?;

        self.get(RoleId::new(row.id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role doesn't exist,
    /// `RepositoryError::Conflict` on a duplicate name or unknown permission.
    pub async fn update(&self, id: RoleId, patch: &RolePatch) -> Result<Role, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE app.role
            SET name = COALESCE($2, name),
                is_active = COALESCE($3, is_active),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .bind(patch.name.as_deref())
        .bind(patch.is_active)
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_unique("role name already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        if let Some(permissions) = &patch.permissions {
            replace_permissions(&mut tx, id, permissions).await?;
        }
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a role. Users holding it lose it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role doesn't exist.
    pub async fn delete(&self, id: RoleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM app.role WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn resolve(&self, rows: Vec<RoleRow>) -> Result<Vec<Role>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let grants = sqlx::query_as::<_, RolePermissionRow>(
            r"
            SELECT rp.role_id, p.id, p.name, p.action, p.resource, p.description
            FROM app.role_permission rp
            JOIN app.permission p ON p.id = rp.permission_id
            WHERE rp.role_id = ANY($1)
            ORDER BY p.resource, p.action
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_role: HashMap<i32, Vec<PermissionRef>> = HashMap::new();
        for row in grants {
            by_role
                .entry(row.role_id)
                .or_default()
                .push(PermissionRef::Resolved(Permission::from(row.permission)));
        }

        Ok(rows
            .into_iter()
            .map(|row| Role {
                id: RoleId::new(row.id),
                permissions: by_role.remove(&row.id).unwrap_or_default(),
                name: row.name,
                is_active: row.is_active,
                system: row.is_system,
            })
            .collect())
    }
}

async fn replace_permissions(
    conn: &mut PgConnection,
    role: RoleId,
    permissions: &[PermissionId],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM app.role_permission WHERE role_id = $1")
        .bind(role.as_i32())
        .execute(&mut *conn)
        .await?;

    let ids: Vec<i32> = permissions.iter().map(PermissionId::as_i32).collect();
    sqlx::query(
        r"
        INSERT INTO app.role_permission (role_id, permission_id)
        SELECT $1, UNNEST($2::int4[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(role.as_i32())
    .bind(&ids)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::Conflict("unknown permission".to_owned());
        }
        RepositoryError::Database(e)
    })?;

    Ok(())
}
