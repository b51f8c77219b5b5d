//! Permission catalog management.

use sqlx::PgPool;

use tablewise_core::{Action, Collection, Permission, PermissionId, Principal, RecordId, RecordRef};

use super::access::AccessService;
use crate::db::RepositoryError;
use crate::db::permissions::{NewPermission, PermissionPatch, PermissionRepository};
use crate::error::AppError;

const COLLECTION: Collection = Collection::Permissions;

fn record_id(id: PermissionId) -> Option<RecordId> {
    Some(RecordId::new(id.as_i32()))
}

/// Permission catalog service.
pub struct PermissionService<'a> {
    access: AccessService<'a>,
    permissions: PermissionRepository<'a>,
}

impl<'a> PermissionService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            access: AccessService::new(pool),
            permissions: PermissionRepository::new(pool),
        }
    }

    /// List the catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if the principal may not read permissions.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Permission>, AppError> {
        self.access
            .require(principal, Action::Read, COLLECTION, &RecordRef::default(), None)
            .await?;
        Ok(self.permissions.list().await?)
    }

    /// Get one permission.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `NotFound` if it doesn't exist.
    pub async fn get(&self, principal: &Principal, id: PermissionId) -> Result<Permission, AppError> {
        self.access
            .require(principal, Action::Read, COLLECTION, &RecordRef::default(), record_id(id))
            .await?;
        Ok(self
            .permissions
            .get(id)
            .await?
            .ok_or(RepositoryError::NotFound)?)
    }

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `Conflict` on a duplicate.
    pub async fn create(&self, principal: &Principal, new: &NewPermission) -> Result<Permission, AppError> {
        self.access
            .require(principal, Action::Create, COLLECTION, &RecordRef::default(), None)
            .await?;
        let permission = self.permissions.create(new).await?;
        tracing::info!(permission_id = %permission.id, name = %permission.name, "Permission created");
        Ok(permission)
    }

    /// Rename or re-describe a permission.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `NotFound` or `Conflict` from
    /// the repository.
    pub async fn update(
        &self,
        principal: &Principal,
        id: PermissionId,
        patch: &PermissionPatch,
    ) -> Result<Permission, AppError> {
        self.access
            .require(principal, Action::Update, COLLECTION, &RecordRef::default(), record_id(id))
            .await?;
        Ok(self.permissions.update(id, patch).await?)
    }

    /// Delete a permission.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `NotFound` if it doesn't exist.
    pub async fn delete(&self, principal: &Principal, id: PermissionId) -> Result<(), AppError> {
        self.access
            .require(principal, Action::Delete, COLLECTION, &RecordRef::default(), record_id(id))
            .await?;
        self.permissions.delete(id).await?;
        tracing::info!(permission_id = %id, "Permission deleted");
        Ok(())
    }
}
