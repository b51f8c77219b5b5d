//! Role-mutation guard.
//!
//! Every write to a role or to a user's role membership passes through here
//! after the evaluator has allowed it. A proposed change is either validated,
//! in which case the write proceeds, or rejected with one of the guard errors,
//! in which case nothing in the request is applied.
//!
//! The last-administrator rule is global: it counts active accounts holding
//! the Administrator role, and the caller must supply that count from inside
//! the transaction performing the write.

use super::error::AccessError;
use super::model::is_administrator_name;
use super::principal::Principal;

/// A proposed change to a role record.
///
/// `system` is set when the existing role is the protected system role,
/// whatever it is currently named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMutation<'a> {
    Create { name: &'a str },
    Rename { from: &'a str, to: &'a str, system: bool },
    Delete { name: &'a str, system: bool },
}

/// Validate a role write.
///
/// # Errors
///
/// - [`AccessError::ProtectedRoleViolation`] when deleting Administrator, or
///   when a non-admin renames it.
/// - [`AccessError::PrivilegeEscalationAttempt`] when a non-admin creates a
///   role named Administrator or renames another role to that name.
pub fn check_role_mutation(actor: &Principal, mutation: RoleMutation<'_>) -> Result<(), AccessError> {
    let is_admin = actor.is_admin();

    match mutation {
        RoleMutation::Delete { name, system } if system || is_administrator_name(name) => Err(
            AccessError::ProtectedRoleViolation("it cannot be deleted"),
        ),
        RoleMutation::Rename { from, to, .. } if from == to => Ok(()),
        RoleMutation::Rename { from, system, .. } if system || is_administrator_name(from) => {
            if is_admin {
                Ok(())
            } else {
                Err(AccessError::ProtectedRoleViolation(
                    "only an Administrator can rename it",
                ))
            }
        }
        RoleMutation::Rename { to: name, .. } | RoleMutation::Create { name }
            if is_administrator_name(name) && !is_admin =>
        {
            Err(AccessError::PrivilegeEscalationAttempt)
        }
        RoleMutation::Create { .. } | RoleMutation::Rename { .. } | RoleMutation::Delete { .. } => {
            Ok(())
        }
    }
}

/// Administrator-relevant state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountState {
    /// Holds the Administrator role.
    pub administrator: bool,
    /// Account is active.
    pub active: bool,
}

impl AccountState {
    #[must_use]
    pub const fn new(administrator: bool, active: bool) -> Self {
        Self {
            administrator,
            active,
        }
    }

    /// Whether the account counts towards the active-administrator total.
    #[must_use]
    pub const fn counts_as_admin(self) -> bool {
        self.administrator && self.active
    }
}

/// A proposed change to a user account.
///
/// `before` is `None` for a create, `after` is `None` for a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserWrite {
    pub before: Option<AccountState>,
    pub after: Option<AccountState>,
    /// The write replaces the login email or password.
    pub credentials: bool,
}

impl UserWrite {
    #[must_use]
    pub const fn create(after: AccountState) -> Self {
        Self {
            before: None,
            after: Some(after),
            credentials: false,
        }
    }

    #[must_use]
    pub const fn update(before: AccountState, after: AccountState) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
            credentials: false,
        }
    }

    #[must_use]
    pub const fn delete(before: AccountState) -> Self {
        Self {
            before: Some(before),
            after: None,
            credentials: false,
        }
    }

    /// Mark the write as replacing the account's email or password.
    #[must_use]
    pub const fn with_credentials(mut self) -> Self {
        self.credentials = true;
        self
    }
}

/// Validate a user write.
///
/// `active_admins` is the number of active accounts currently holding the
/// Administrator role, including the target.
///
/// # Errors
///
/// - [`AccessError::Denied`] when a non-admin deletes an account.
/// - [`AccessError::PrivilegeEscalationAttempt`] when a non-admin grants or
///   revokes Administrator, or changes an Administrator's active flag, email
///   or password.
/// - [`AccessError::LastAdminLockout`] when the write would leave no active
///   Administrator.
pub fn check_user_write(
    actor: &Principal,
    write: UserWrite,
    active_admins: usize,
) -> Result<(), AccessError> {
    let before = write.before.unwrap_or_default();
    let after = write.after.unwrap_or_default();

    if !actor.is_admin() {
        if write.before.is_some() && write.after.is_none() {
            return Err(AccessError::Denied);
        }
        if before.administrator != after.administrator {
            return Err(AccessError::PrivilegeEscalationAttempt);
        }
        if before.administrator && (before.active != after.active || write.credentials) {
            return Err(AccessError::PrivilegeEscalationAttempt);
        }
    }

    if before.counts_as_admin() && !after.counts_as_admin() && active_admins <= 1 {
        return Err(AccessError::LastAdminLockout);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::access::model::ADMINISTRATOR;
    use crate::access::principal::{RoleGrant, UserPrincipal};
    use crate::types::{RoleId, UserId};

    fn principal(role: &str) -> Principal {
        Principal::User(UserPrincipal {
            id: UserId::new(1),
            roles: vec![RoleGrant {
                id: RoleId::new(1),
                name: role.into(),
                active: true,
                grants: BTreeSet::new(),
                system: false,
            }],
            restaurants: vec![],
        })
    }

    const ADMIN: AccountState = AccountState::new(true, true);
    const STAFF: AccountState = AccountState::new(false, true);

    #[test]
    fn test_delete_administrator_always_rejected() {
        for actor in [principal(ADMINISTRATOR), principal("Manager")] {
            assert!(matches!(
                check_role_mutation(
                    &actor,
                    RoleMutation::Delete {
                        name: ADMINISTRATOR,
                        system: true
                    }
                ),
                Err(AccessError::ProtectedRoleViolation(_))
            ));
        }
    }

    #[test]
    fn test_rename_administrator_requires_admin() {
        let rename = RoleMutation::Rename {
            from: ADMINISTRATOR,
            to: "Owner",
            system: true,
        };
        assert!(check_role_mutation(&principal(ADMINISTRATOR), rename).is_ok());
        assert!(matches!(
            check_role_mutation(&principal("Manager"), rename),
            Err(AccessError::ProtectedRoleViolation(_))
        ));
    }

    #[test]
    fn test_non_admin_cannot_mint_administrator_role() {
        let manager = principal("Manager");
        assert_eq!(
            check_role_mutation(&manager, RoleMutation::Create { name: ADMINISTRATOR }),
            Err(AccessError::PrivilegeEscalationAttempt)
        );
        assert_eq!(
            check_role_mutation(
                &manager,
                RoleMutation::Rename {
                    from: "Cook",
                    to: ADMINISTRATOR,
                    system: false
                }
            ),
            Err(AccessError::PrivilegeEscalationAttempt)
        );
    }

    #[test]
    fn test_ordinary_role_changes_validate() {
        let manager = principal("Manager");
        assert!(check_role_mutation(&manager, RoleMutation::Create { name: "Host" }).is_ok());
        assert!(
            check_role_mutation(
                &manager,
                RoleMutation::Delete {
                    name: "Host",
                    system: false
                }
            )
            .is_ok()
        );
        assert!(
            check_role_mutation(
                &manager,
                RoleMutation::Rename {
                    from: ADMINISTRATOR,
                    to: ADMINISTRATOR,
                    system: true
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn test_renamed_system_role_stays_protected() {
        let delete = RoleMutation::Delete {
            name: "Owner",
            system: true,
        };
        assert!(matches!(
            check_role_mutation(&principal(ADMINISTRATOR), delete),
            Err(AccessError::ProtectedRoleViolation(_))
        ));

        let rename = RoleMutation::Rename {
            from: "Owner",
            to: "Proprietor",
            system: true,
        };
        assert!(matches!(
            check_role_mutation(&principal("Manager"), rename),
            Err(AccessError::ProtectedRoleViolation(_))
        ));
        assert!(check_role_mutation(&principal(ADMINISTRATOR), rename).is_ok());
    }

    #[test]
    fn test_sole_admin_self_demotion_locked_out() {
        let write = UserWrite::update(ADMIN, STAFF);
        assert_eq!(
            check_user_write(&principal(ADMINISTRATOR), write, 1),
            Err(AccessError::LastAdminLockout)
        );
        assert!(check_user_write(&principal(ADMINISTRATOR), write, 2).is_ok());
    }

    #[test]
    fn test_deactivating_or_deleting_last_admin_locked_out() {
        let admin = principal(ADMINISTRATOR);
        let deactivate = UserWrite::update(ADMIN, AccountState::new(true, false));
        assert_eq!(
            check_user_write(&admin, deactivate, 1),
            Err(AccessError::LastAdminLockout)
        );
        assert_eq!(
            check_user_write(&admin, UserWrite::delete(ADMIN), 1),
            Err(AccessError::LastAdminLockout)
        );
    }

    #[test]
    fn test_non_admin_cannot_change_admin_membership() {
        let manager = principal("Manager");
        assert_eq!(
            check_user_write(&manager, UserWrite::update(STAFF, ADMIN), 1),
            Err(AccessError::PrivilegeEscalationAttempt)
        );
        assert_eq!(
            check_user_write(&manager, UserWrite::update(ADMIN, STAFF), 3),
            Err(AccessError::PrivilegeEscalationAttempt)
        );
        assert_eq!(
            check_user_write(&manager, UserWrite::create(ADMIN), 1),
            Err(AccessError::PrivilegeEscalationAttempt)
        );
        assert_eq!(
            check_user_write(&manager, UserWrite::delete(STAFF), 1),
            Err(AccessError::Denied)
        );
    }

    #[test]
    fn test_non_role_update_by_staff_validates() {
        let manager = principal("Manager");
        assert!(check_user_write(&manager, UserWrite::update(STAFF, STAFF), 1).is_ok());
        assert!(check_user_write(&manager, UserWrite::update(ADMIN, ADMIN), 1).is_ok());
    }

    #[test]
    fn test_non_admin_cannot_replace_admin_credentials() {
        let manager = principal("Manager");
        assert_eq!(
            check_user_write(&manager, UserWrite::update(ADMIN, ADMIN).with_credentials(), 1),
            Err(AccessError::PrivilegeEscalationAttempt)
        );
        assert!(
            check_user_write(&manager, UserWrite::update(STAFF, STAFF).with_credentials(), 1)
                .is_ok()
        );
        assert!(
            check_user_write(
                &principal(ADMINISTRATOR),
                UserWrite::update(ADMIN, ADMIN).with_credentials(),
                1
            )
            .is_ok()
        );
    }
}
