//! Requesting principals.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::AccessError;
use super::model::{Grant, PermissionRef, Role, RoleRef, User, is_administrator_name};
use crate::types::{RestaurantId, RoleId, UserId};

/// A role with its permissions flattened to grants.
///
/// This is the form roles take once resolved, both inside a [`Principal`] and
/// inside session claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub id: RoleId,
    pub name: String,
    pub active: bool,
    pub grants: BTreeSet<Grant>,
    #[serde(default)]
    pub system: bool,
}

impl RoleGrant {
    /// Flatten a fully resolved role.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnresolvedPermission`] if any permission is still
    /// a bare ID.
    pub fn from_role(role: &Role) -> Result<Self, AccessError> {
        let grants = role
            .permissions
            .iter()
            .map(|p| match p {
                PermissionRef::Resolved(permission) => Ok(permission.grant()),
                PermissionRef::Unresolved(id) => Err(AccessError::UnresolvedPermission(*id)),
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self {
            id: role.id,
            name: role.name.clone(),
            active: role.is_active,
            grants,
            system: role.system,
        })
    }

    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.system || is_administrator_name(&self.name)
    }
}

/// An authenticated user as seen by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrincipal {
    pub id: UserId,
    pub roles: Vec<RoleGrant>,
    pub restaurants: Vec<RestaurantId>,
}

impl UserPrincipal {
    /// Whether any held role is the Administrator role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(RoleGrant::is_administrator)
    }

    /// Whether an active role grants `grant`.
    #[must_use]
    pub fn has_grant(&self, grant: Grant) -> bool {
        self.roles
            .iter()
            .filter(|r| r.active)
            .any(|r| r.grants.contains(&grant))
    }

    /// Union of grants across active roles.
    #[must_use]
    pub fn grants(&self) -> BTreeSet<Grant> {
        self.roles
            .iter()
            .filter(|r| r.active)
            .flat_map(|r| r.grants.iter().copied())
            .collect()
    }

    #[must_use]
    pub fn operates_in(&self, restaurant: RestaurantId) -> bool {
        self.restaurants.contains(&restaurant)
    }
}

/// The party making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    #[default]
    Anonymous,
    User(UserPrincipal),
}

impl Principal {
    /// Build a principal from a user whose roles and permissions are resolved.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnresolvedRole`] or
    /// [`AccessError::UnresolvedPermission`] for any bare-ID reference.
    pub fn from_user(user: &User) -> Result<Self, AccessError> {
        let roles = user
            .roles
            .iter()
            .map(|r| match r {
                RoleRef::Resolved(role) => RoleGrant::from_role(role),
                RoleRef::Unresolved(id) => Err(AccessError::UnresolvedRole(*id)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::User(UserPrincipal {
            id: user.id,
            roles,
            restaurants: user.restaurants.clone(),
        }))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::User(u) if u.is_admin())
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(u) => Some(u.id),
        }
    }

    #[must_use]
    pub const fn as_user(&self) -> Option<&UserPrincipal> {
        match self {
            Self::Anonymous => None,
            Self::User(u) => Some(u),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::access::model::{Action, Permission, Resource};
    use crate::types::{Email, PermissionId};

    fn permission(id: i32, action: Action, resource: Resource) -> PermissionRef {
        PermissionRef::Resolved(Permission {
            id: PermissionId::new(id),
            name: format!("{resource}:{action}"),
            action,
            resource,
            description: String::new(),
        })
    }

    fn user(roles: Vec<RoleRef>) -> User {
        User {
            id: UserId::new(10),
            email: Email::parse("staff@osteria.com").unwrap(),
            roles,
            restaurants: vec![RestaurantId::new(1)],
            is_active: true,
        }
    }

    #[test]
    fn test_from_user_flattens_grants() {
        let role = Role {
            id: RoleId::new(2),
            name: "Waiter".into(),
            permissions: vec![
                permission(1, Action::Read, Resource::Orders),
                permission(2, Action::Update, Resource::Orders),
            ],
            is_active: true,
            system: false,
        };
        let principal = Principal::from_user(&user(vec![RoleRef::Resolved(role)])).unwrap();
        let staff = principal.as_user().unwrap();
        assert!(staff.has_grant(Grant::new(Action::Update, Resource::Orders)));
        assert!(!staff.has_grant(Grant::new(Action::Delete, Resource::Orders)));
        assert!(!principal.is_admin());
    }

    #[test]
    fn test_unresolved_role_is_rejected() {
        let err = Principal::from_user(&user(vec![RoleRef::Unresolved(RoleId::new(9))]));
        assert_eq!(err, Err(AccessError::UnresolvedRole(RoleId::new(9))));
    }

    #[test]
    fn test_unresolved_permission_is_rejected() {
        let role = Role {
            id: RoleId::new(2),
            name: "Host".into(),
            permissions: vec![PermissionRef::Unresolved(PermissionId::new(5))],
            is_active: true,
            system: false,
        };
        let err = Principal::from_user(&user(vec![RoleRef::Resolved(role)]));
        assert_eq!(
            err,
            Err(AccessError::UnresolvedPermission(PermissionId::new(5)))
        );
    }

    #[test]
    fn test_inactive_role_grants_nothing() {
        let principal = UserPrincipal {
            id: UserId::new(1),
            roles: vec![RoleGrant {
                id: RoleId::new(1),
                name: "Cook".into(),
                active: false,
                grants: BTreeSet::from([Grant::new(Action::Read, Resource::Kitchen)]),
                system: false,
            }],
            restaurants: vec![],
        };
        assert!(!principal.has_grant(Grant::new(Action::Read, Resource::Kitchen)));
        assert!(principal.grants().is_empty());
    }

    #[test]
    fn test_renamed_system_role_keeps_admin_status() {
        let role = Role {
            id: RoleId::new(1),
            name: "Owner".into(),
            permissions: vec![],
            is_active: true,
            system: true,
        };
        assert!(role.is_administrator());
        let principal = Principal::from_user(&user(vec![RoleRef::Resolved(role)])).unwrap();
        assert!(principal.is_admin());
    }
}
