//! Integration tests for the role-mutation guard.
//!
//! Each scenario first asks the evaluator, as the services do, and then runs
//! the guard on the proposed write. The guard is pure; the lock that feeds it
//! the admin count is exercised in `store_guards`.

use tablewise_core::access::{
    AccountState, Collection, Grant, RoleMutation, UserWrite, check_role_mutation,
    check_user_write,
};
use tablewise_core::{AccessError, Action, Decision, RecordRef, Resource, UserId, evaluate};
use tablewise_integration_tests::{administrator, customer, staff};

const ADMIN: AccountState = AccountState::new(true, true);
const STAFF: AccountState = AccountState::new(false, true);

// =============================================================================
// Role writes
// =============================================================================

#[test]
fn test_renaming_administrator() {
    let rename = RoleMutation::Rename {
        from: "Administrator",
        to: "Owner",
        system: true,
    };
    let manager = staff(5, &[Grant::new(Action::Update, Resource::Settings)], &[]);

    assert!(matches!(
        check_role_mutation(&manager, rename),
        Err(AccessError::ProtectedRoleViolation(_))
    ));
    assert_eq!(check_role_mutation(&administrator(1), rename), Ok(()));

    // Once renamed, the system role is still the protected one.
    let renamed = RoleMutation::Delete {
        name: "Owner",
        system: true,
    };
    assert!(matches!(
        check_role_mutation(&administrator(1), renamed),
        Err(AccessError::ProtectedRoleViolation(_))
    ));
}

#[test]
fn test_nobody_deletes_administrator() {
    let delete = RoleMutation::Delete {
        name: "Administrator",
        system: true,
    };
    for actor in [administrator(1), staff(5, &[], &[]), customer(9)] {
        assert!(matches!(
            check_role_mutation(&actor, delete),
            Err(AccessError::ProtectedRoleViolation(_))
        ));
    }
}

#[test]
fn test_non_admin_cannot_mint_an_administrator_role() {
    let manager = staff(5, &[Grant::new(Action::Create, Resource::Settings)], &[]);

    assert_eq!(
        check_role_mutation(&manager, RoleMutation::Create { name: "Administrator" }),
        Err(AccessError::PrivilegeEscalationAttempt)
    );
    assert_eq!(
        check_role_mutation(
            &manager,
            RoleMutation::Rename {
                from: "Host",
                to: "Administrator",
                system: false
            }
        ),
        Err(AccessError::PrivilegeEscalationAttempt)
    );
    assert_eq!(
        check_role_mutation(&manager, RoleMutation::Create { name: "Host" }),
        Ok(())
    );
}

// =============================================================================
// User writes
// =============================================================================

#[test]
fn test_sole_administrator_cannot_demote_self() {
    let admin = administrator(1);
    let own_account = RecordRef::owned_by(UserId::new(1));

    let decision = evaluate(&admin, Action::Update, Collection::Users, Some(&own_account)).decision;
    assert_eq!(decision, Decision::Allow);

    let write = UserWrite::update(ADMIN, STAFF);
    assert_eq!(
        check_user_write(&admin, write, 1),
        Err(AccessError::LastAdminLockout)
    );
}

#[test]
fn test_demotion_allowed_while_another_admin_remains() {
    let write = UserWrite::update(ADMIN, STAFF);
    assert_eq!(check_user_write(&administrator(1), write, 2), Ok(()));
}

#[test]
fn test_second_demotion_refused_once_count_reaches_one() {
    let write = UserWrite::update(ADMIN, STAFF);
    assert_eq!(check_user_write(&administrator(1), write, 2), Ok(()));
    assert_eq!(
        check_user_write(&administrator(2), write, 1),
        Err(AccessError::LastAdminLockout)
    );
}

#[test]
fn test_deactivating_or_deleting_last_admin_is_refused() {
    let admin = administrator(1);
    assert_eq!(
        check_user_write(&admin, UserWrite::update(ADMIN, AccountState::new(true, false)), 1),
        Err(AccessError::LastAdminLockout)
    );
    assert_eq!(
        check_user_write(&admin, UserWrite::delete(ADMIN), 1),
        Err(AccessError::LastAdminLockout)
    );
}

#[test]
fn test_inactive_admin_does_not_count() {
    let dormant = AccountState::new(true, false);
    assert_eq!(
        check_user_write(&administrator(1), UserWrite::delete(dormant), 1),
        Ok(())
    );
}

#[test]
fn test_staff_with_users_update_cannot_grant_administrator() {
    let manager = staff(5, &[Grant::new(Action::Update, Resource::Users)], &[1]);
    let colleague = RecordRef::owned_by(UserId::new(6));

    let decision = evaluate(&manager, Action::Update, Collection::Users, Some(&colleague)).decision;
    assert_eq!(decision, Decision::Allow);

    assert_eq!(
        check_user_write(&manager, UserWrite::update(STAFF, ADMIN), 1),
        Err(AccessError::PrivilegeEscalationAttempt)
    );
    // A field that leaves Administrator membership untouched passes.
    assert_eq!(
        check_user_write(&manager, UserWrite::update(STAFF, STAFF), 1),
        Ok(())
    );
}

#[test]
fn test_staff_cannot_suspend_or_delete_an_admin() {
    let manager = staff(5, &[Grant::new(Action::Update, Resource::Users)], &[1]);
    assert_eq!(
        check_user_write(&manager, UserWrite::update(ADMIN, AccountState::new(true, false)), 3),
        Err(AccessError::PrivilegeEscalationAttempt)
    );
    assert_eq!(
        check_user_write(&manager, UserWrite::delete(STAFF), 3),
        Err(AccessError::Denied)
    );
}

#[test]
fn test_staff_with_users_update_cannot_take_over_an_admin_account() {
    let manager = staff(5, &[Grant::new(Action::Update, Resource::Users)], &[]);
    let admin_account = RecordRef::owned_by(UserId::new(1));

    let decision = evaluate(&manager, Action::Update, Collection::Users, Some(&admin_account)).decision;
    assert_eq!(decision, Decision::Allow);

    assert_eq!(
        check_user_write(&manager, UserWrite::update(ADMIN, ADMIN).with_credentials(), 1),
        Err(AccessError::PrivilegeEscalationAttempt)
    );
    // Credentials of non-admin colleagues remain editable.
    assert_eq!(
        check_user_write(&manager, UserWrite::update(STAFF, STAFF).with_credentials(), 1),
        Ok(())
    );
}

#[test]
fn test_staff_may_create_non_admin_accounts_only() {
    let manager = staff(5, &[Grant::new(Action::Create, Resource::Users)], &[1]);
    assert_eq!(
        check_user_write(&manager, UserWrite::create(STAFF), 0),
        Ok(())
    );
    assert_eq!(
        check_user_write(&manager, UserWrite::create(ADMIN), 0),
        Err(AccessError::PrivilegeEscalationAttempt)
    );
}
