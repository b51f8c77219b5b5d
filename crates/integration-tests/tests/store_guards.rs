//! Integration tests for guarded writes against `PostgreSQL`.
//!
//! These need a database at `TABLEWISE_TEST_DATABASE_URL`. Each test creates
//! its own accounts under unique emails and deletes them afterwards. Other
//! Administrators may already exist, so admin counts are compared relative
//! to what the first writer saw.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use sqlx::PgPool;

use tablewise_admin::db::roles::{NewRole, RolePatch};
use tablewise_admin::db::users::{
    self, Account, AccountPatch, NewAccount, apply_patch, lock_admin_count,
};
use tablewise_admin::db::{RoleRepository, UserRepository};
use tablewise_admin::error::AppError;
use tablewise_admin::services::auth::hash_password;
use tablewise_admin::services::users::UpdateUser;
use tablewise_admin::services::{RoleService, UserService};
use tablewise_core::access::{ADMINISTRATOR, Grant};
use tablewise_core::{AccessError, Action, Email, Principal, Resource, Role, RoleId, UserId};
use tablewise_integration_tests::{database_pool, staff, unique_email};

async fn system_role(pool: &PgPool) -> Role {
    let roles = RoleRepository::new(pool);
    if let Some(role) = roles.get_system().await.unwrap() {
        return role;
    }
    roles
        .create(&NewRole {
            name: ADMINISTRATOR.to_owned(),
            permissions: Vec::new(),
            is_active: true,
            system: true,
        })
        .await
        .unwrap()
}

async fn create_account(pool: &PgPool, tag: &str, roles: Vec<RoleId>) -> Account {
    UserRepository::new(pool)
        .create(&NewAccount {
            email: Email::parse(&unique_email(tag)).unwrap(),
            password_hash: hash_password("correct horse battery").unwrap(),
            roles,
            restaurants: Vec::new(),
        })
        .await
        .unwrap()
}

async fn principal_for(pool: &PgPool, account: &Account) -> Principal {
    let roles = RoleRepository::new(pool).get_many(&account.roles).await.unwrap();
    Principal::from_user(&account.to_user(&roles)).unwrap()
}

async fn remove(pool: &PgPool, ids: &[UserId]) {
    let mut conn = pool.acquire().await.unwrap();
    for id in ids {
        users::delete(&mut conn, *id).await.unwrap();
    }
}

// =============================================================================
// Last-admin lock
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL at TABLEWISE_TEST_DATABASE_URL"]
async fn test_waiting_writer_counts_admins_after_first_commit() {
    let pool = database_pool().await;
    let system = system_role(&pool).await;
    let first = create_account(&pool, "first-admin", vec![system.id]).await;
    let second = create_account(&pool, "second-admin", vec![system.id]).await;

    let mut tx = pool.begin().await.unwrap();
    let seen_first = lock_admin_count(&mut tx).await.unwrap();
    assert!(seen_first >= 2);

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move {
        let mut tx = waiter_pool.begin().await.unwrap();
        let seen = lock_admin_count(&mut tx).await.unwrap();
        tx.rollback().await.unwrap();
        seen
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished(), "second writer must wait for the lock");

    let demote = AccountPatch {
        roles: Some(Vec::new()),
        ..AccountPatch::default()
    };
    apply_patch(&mut tx, second.id, &demote).await.unwrap();
    tx.commit().await.unwrap();

    let seen_second = waiter.await.unwrap();
    remove(&pool, &[first.id, second.id]).await;

    assert_eq!(seen_second, seen_first - 1);
}

// =============================================================================
// Role writes
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL at TABLEWISE_TEST_DATABASE_URL"]
async fn test_admin_renames_administrator_role_and_stays_admin() {
    let pool = database_pool().await;
    let system = system_role(&pool).await;
    let admin = create_account(&pool, "owner", vec![system.id]).await;
    let principal = principal_for(&pool, &admin).await;
    assert!(principal.is_admin());

    let service = RoleService::new(&pool);
    let new_name = format!("Owner {}", admin.id);
    let renamed = service
        .update(
            &principal,
            system.id,
            &RolePatch {
                name: Some(new_name.clone()),
                ..RolePatch::default()
            },
        )
        .await;

    let after = principal_for(&pool, &admin).await;
    let restored = service
        .update(
            &after,
            system.id,
            &RolePatch {
                name: Some(system.name.clone()),
                ..RolePatch::default()
            },
        )
        .await;
    remove(&pool, &[admin.id]).await;

    let renamed = renamed.unwrap();
    assert_eq!(renamed.name, new_name);
    assert!(renamed.system);
    assert!(after.is_admin());
    assert_eq!(restored.unwrap().name, system.name);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL at TABLEWISE_TEST_DATABASE_URL"]
async fn test_administrator_role_cannot_be_deleted() {
    let pool = database_pool().await;
    let system = system_role(&pool).await;
    let admin = create_account(&pool, "deleter", vec![system.id]).await;
    let principal = principal_for(&pool, &admin).await;

    let result = RoleService::new(&pool).delete(&principal, system.id).await;
    let still_there = RoleRepository::new(&pool).get(system.id).await.unwrap();
    remove(&pool, &[admin.id]).await;

    assert!(matches!(
        result,
        Err(AppError::Access(AccessError::ProtectedRoleViolation(_)))
    ));
    assert!(still_there.is_some());
}

// =============================================================================
// User writes
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL at TABLEWISE_TEST_DATABASE_URL"]
async fn test_staff_cannot_replace_admin_credentials() {
    let pool = database_pool().await;
    let system = system_role(&pool).await;
    let admin = create_account(&pool, "target-admin", vec![system.id]).await;
    let manager_account = create_account(&pool, "manager", Vec::new()).await;
    let manager = staff(
        manager_account.id.as_i32(),
        &[Grant::new(Action::Update, Resource::Users)],
        &[],
    );

    let repository = UserRepository::new(&pool);
    let (_, hash_before) = repository.get_with_password(&admin.email).await.unwrap().unwrap();

    let service = UserService::new(&pool);
    let password = service
        .update(
            &manager,
            admin.id,
            UpdateUser {
                password: Some("an entirely new passphrase".into()),
                ..UpdateUser::default()
            },
        )
        .await;
    let email = service
        .update(
            &manager,
            admin.id,
            UpdateUser {
                email: Some(unique_email("hijacked")),
                ..UpdateUser::default()
            },
        )
        .await;

    let stored = repository.get_with_password(&admin.email).await.unwrap();
    remove(&pool, &[admin.id, manager_account.id]).await;

    assert!(matches!(
        password,
        Err(AppError::Access(AccessError::PrivilegeEscalationAttempt))
    ));
    assert!(matches!(
        email,
        Err(AppError::Access(AccessError::PrivilegeEscalationAttempt))
    ));
    let (_, hash_after) = stored.unwrap();
    assert_eq!(hash_before, hash_after);
}
