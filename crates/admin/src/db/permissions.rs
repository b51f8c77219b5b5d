//! Permission catalog repository.

use sqlx::PgPool;

use tablewise_core::{Action, Permission, PermissionId, Resource};

use super::{RepositoryError, conflict_on_unique};

/// Internal row type for permission queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PermissionRow {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) action: Action,
    pub(crate) resource: Resource,
    pub(crate) description: String,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Self {
            id: PermissionId::new(row.id),
            name: row.name,
            action: row.action,
            resource: row.resource,
            description: row.description,
        }
    }
}

/// Fields of a new permission.
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub action: Action,
    pub resource: Resource,
    pub description: String,
}

/// Partial update of a permission. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct PermissionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Repository for the permission catalog.
pub struct PermissionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PermissionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the whole catalog ordered by resource then action.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Permission>, RepositoryError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r"
            SELECT id, name, action, resource, description
            FROM app.permission
            ORDER BY resource, action
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a permission by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PermissionId) -> Result<Option<Permission>, RepositoryError> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r"
            SELECT id, name, action, resource, description
            FROM app.permission
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or the (action,
    /// resource) pair already exists.
    pub async fn create(&self, new: &NewPermission) -> Result<Permission, RepositoryError> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r"
            INSERT INTO app.permission (name, action, resource, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, action, resource, description
            ",
        )
        .bind(&new.name)
        .bind(new.action)
        .bind(new.resource)
        .bind(&new.description)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("permission already exists"))?;

        Ok(row.into())
    }

    /// Rename or re-describe a permission. The grant itself is immutable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the permission doesn't exist,
    /// `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: PermissionId,
        patch: &PermissionPatch,
    ) -> Result<Permission, RepositoryError> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r"
            UPDATE app.permission
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING id, name, action, resource, description
            ",
        )
        .bind(id.as_i32())
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("permission name already exists"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a permission. Roles holding it lose it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the permission doesn't exist.
    pub async fn delete(&self, id: PermissionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM app.permission WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert one permission per action and resource, skipping existing ones.
    ///
    /// Returns the number of permissions inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn ensure_catalog(&self) -> Result<u64, RepositoryError> {
        let mut inserted = 0;
        for resource in Resource::ALL {
            for action in Action::ALL {
                let result = sqlx::query(
                    r"
                    INSERT INTO app.permission (name, action, resource, description)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT DO NOTHING
                    ",
                )
                .bind(catalog_name(action, resource))
                .bind(action)
                .bind(resource)
                .bind(format!("Allows {action} on {resource}"))
                .execute(self.pool)
                .await?;
                inserted += result.rows_affected();
            }
        }
        Ok(inserted)
    }
}

/// Catalog name of the permission granting `action` on `resource`, e.g.
/// `orders:read`.
#[must_use]
pub fn catalog_name(action: Action, resource: Resource) -> String {
    format!("{resource}:{action}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_name_matches_grant_display() {
        let name = catalog_name(Action::Update, Resource::Tables);
        assert_eq!(name, "tables:update");
        assert_eq!(name, tablewise_core::Grant::new(Action::Update, Resource::Tables).to_string());
    }
}
