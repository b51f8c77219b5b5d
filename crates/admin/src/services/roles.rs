//! Role management.
//!
//! Role writes pass the evaluator first and the role-mutation guard second.
//! Guard rejections are audited as `rejected` and abort the write.

use sqlx::PgPool;

use tablewise_core::access::{RoleMutation, check_role_mutation};
use tablewise_core::{AccessError, Action, Collection, Principal, RecordId, RecordRef, Role, RoleId};

use super::access::AccessService;
use crate::db::RepositoryError;
use crate::db::roles::{NewRole, RolePatch, RoleRepository};
use crate::error::AppError;

const COLLECTION: Collection = Collection::Roles;

fn record_id(id: RoleId) -> Option<RecordId> {
    Some(RecordId::new(id.as_i32()))
}

/// Role service.
pub struct RoleService<'a> {
    access: AccessService<'a>,
    roles: RoleRepository<'a>,
}

impl<'a> RoleService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            access: AccessService::new(pool),
            roles: RoleRepository::new(pool),
        }
    }

    /// List roles with their permissions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if the principal may not read roles.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Role>, AppError> {
        self.access
            .require(principal, Action::Read, COLLECTION, &RecordRef::default(), None)
            .await?;
        Ok(self.roles.list().await?)
    }

    /// Get one role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `NotFound` if it doesn't exist.
    pub async fn get(&self, principal: &Principal, id: RoleId) -> Result<Role, AppError> {
        self.access
            .require(principal, Action::Read, COLLECTION, &RecordRef::default(), record_id(id))
            .await?;
        Ok(self.roles.get(id).await?.ok_or(RepositoryError::NotFound)?)
    }

    /// Create a role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused or if a non-admin names the role
    /// Administrator.
    pub async fn create(&self, principal: &Principal, new: &NewRole) -> Result<Role, AppError> {
        self.access
            .require(principal, Action::Create, COLLECTION, &RecordRef::default(), None)
            .await?;
        self.guard(principal, Action::Create, None, RoleMutation::Create { name: &new.name })
            .await?;

        let role = self.roles.create(new).await?;
        tracing::info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    /// Update a role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` for refusals and guard rejections. Only an
    /// Administrator may rename the Administrator role; its holders keep
    /// admin status under the new name.
    pub async fn update(&self, principal: &Principal, id: RoleId, patch: &RolePatch) -> Result<Role, AppError> {
        self.access
            .require(principal, Action::Update, COLLECTION, &RecordRef::default(), record_id(id))
            .await?;
        let existing = self.roles.get(id).await?.ok_or(RepositoryError::NotFound)?;

        if let Some(name) = &patch.name {
            let mutation = RoleMutation::Rename {
                from: &existing.name,
                to: name,
                system: existing.system,
            };
            self.guard(principal, Action::Update, record_id(id), mutation)
                .await?;
        }

        let role = self.roles.update(id, patch).await?;
        tracing::info!(role_id = %role.id, name = %role.name, "Role updated");
        Ok(role)
    }

    /// Delete a role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused or if the role is Administrator.
    pub async fn delete(&self, principal: &Principal, id: RoleId) -> Result<(), AppError> {
        self.access
            .require(principal, Action::Delete, COLLECTION, &RecordRef::default(), record_id(id))
            .await?;
        let existing = self.roles.get(id).await?.ok_or(RepositoryError::NotFound)?;
        self.guard(
            principal,
            Action::Delete,
            record_id(id),
            RoleMutation::Delete {
                name: &existing.name,
                system: existing.system,
            },
        )
        .await?;

        self.roles.delete(id).await?;
        tracing::info!(role_id = %id, name = %existing.name, "Role deleted");
        Ok(())
    }

    async fn guard(
        &self,
        principal: &Principal,
        action: Action,
        record: Option<RecordId>,
        mutation: RoleMutation<'_>,
    ) -> Result<(), AccessError> {
        match check_role_mutation(principal, mutation) {
            Ok(()) => Ok(()),
            Err(error) => Err(self
                .access
                .reject(principal, action, COLLECTION, record, error)
                .await),
        }
    }
}
