//! Administrator bootstrap.
//!
//! # Usage
//!
//! ```bash
//! tw-cli admin bootstrap -e owner@example.com -p 'correct horse battery'
//! ```
//!
//! Seeds one permission per action and resource, creates the Administrator
//! role holding all of them (or tops up an existing one), and creates an
//! active account holding that role. Safe to rerun for the catalog and role;
//! the account step fails if the email is taken.
//!
//! # Environment Variables
//!
//! - `TABLEWISE_DATABASE_URL` - `PostgreSQL` connection string

use thiserror::Error;

use tablewise_admin::db::roles::{NewRole, RolePatch};
use tablewise_admin::db::users::NewAccount;
use tablewise_admin::db::{PermissionRepository, RepositoryError, RoleRepository, UserRepository};
use tablewise_admin::services::AuthError;
use tablewise_admin::services::auth::{hash_password, validate_password};
use tablewise_core::access::ADMINISTRATOR;
use tablewise_core::{Email, EmailError, PermissionId, UserId};

use super::{DatabaseError, connect};

/// Errors that can occur during bootstrap.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] DatabaseError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    Password(#[from] AuthError),

    #[error("User already exists with email: {0}")]
    UserExists(String),
}

/// Bootstrap the first Administrator.
///
/// # Returns
///
/// The ID of the created account.
pub async fn bootstrap(email: &str, password: &str) -> Result<UserId, AdminError> {
    let email = Email::parse(email)?;
    validate_password(password)?;

    let pool = connect().await?;
    let permissions = PermissionRepository::new(&pool);
    let roles = RoleRepository::new(&pool);
    let users = UserRepository::new(&pool);

    let inserted = permissions.ensure_catalog().await?;
    tracing::info!(inserted, "Permission catalog seeded");

    let all: Vec<PermissionId> = permissions.list().await?.into_iter().map(|p| p.id).collect();

    let role = match roles.get_system().await? {
        Some(role) => {
            tracing::info!(role_id = %role.id, "Administrator role exists, granting full catalog");
            roles
                .update(
                    role.id,
                    &RolePatch {
                        permissions: Some(all),
                        is_active: Some(true),
                        ..RolePatch::default()
                    },
                )
                .await?
        }
        None => {
            roles
                .create(&NewRole {
                    name: ADMINISTRATOR.to_owned(),
                    permissions: all,
                    is_active: true,
                    system: true,
                })
                .await?
        }
    };

    let account = users
        .create(&NewAccount {
            email: email.clone(),
            password_hash: hash_password(password)?,
            roles: vec![role.id],
            restaurants: Vec::new(),
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Administrator created successfully! ID: {}, Email: {}, Role: {}",
        account.id,
        email,
        role.name
    );

    Ok(account.id)
}
