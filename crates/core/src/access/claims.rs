//! Capability claims cached in a login session.
//!
//! Roles, their grants and the restaurant assignments are resolved once at
//! login and stored in the session, so per-request checks need no database
//! lookups. Changes to a user's roles take effect on the next login or an
//! explicit refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AccessError;
use super::model::User;
use super::principal::{Principal, RoleGrant, UserPrincipal};
use crate::types::{Email, RestaurantId, UserId};

/// Session-stored identity and capabilities of a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: UserId,
    pub email: Email,
    pub roles: Vec<RoleGrant>,
    pub restaurants: Vec<RestaurantId>,
    pub issued_at: DateTime<Utc>,
}

impl SessionClaims {
    /// Issue claims for a user whose roles and permissions are resolved.
    ///
    /// # Errors
    ///
    /// Returns an unresolved-reference error if the user was loaded without
    /// its role graph.
    pub fn issue(user: &User, issued_at: DateTime<Utc>) -> Result<Self, AccessError> {
        let Principal::User(principal) = Principal::from_user(user)? else {
            return Err(AccessError::Denied);
        };

        Ok(Self {
            user_id: user.id,
            email: user.email.clone(),
            roles: principal.roles,
            restaurants: principal.restaurants,
            issued_at,
        })
    }

    /// The principal these claims describe.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal::User(UserPrincipal {
            id: self.user_id,
            roles: self.roles.clone(),
            restaurants: self.restaurants.clone(),
        })
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(RoleGrant::is_administrator)
    }

    #[must_use]
    pub fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(|r| r.name.as_str()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::access::model::{ADMINISTRATOR, Action, Permission, PermissionRef, Resource, Role, RoleRef};
    use crate::types::{PermissionId, RoleId};

    fn user() -> User {
        User {
            id: UserId::new(3),
            email: Email::parse("owner@grill.io").unwrap(),
            roles: vec![RoleRef::Resolved(Role {
                id: RoleId::new(1),
                name: ADMINISTRATOR.into(),
                permissions: vec![PermissionRef::Resolved(Permission {
                    id: PermissionId::new(1),
                    name: "settings:update".into(),
                    action: Action::Update,
                    resource: Resource::Settings,
                    description: String::new(),
                })],
                is_active: true,
                system: true,
            })],
            restaurants: vec![RestaurantId::new(4)],
            is_active: true,
        }
    }

    #[test]
    fn test_issue_and_derive_principal() {
        let claims = SessionClaims::issue(&user(), Utc::now()).unwrap();
        assert!(claims.is_admin());
        assert_eq!(claims.role_names(), vec![ADMINISTRATOR]);
        let principal = claims.principal();
        assert!(principal.is_admin());
        assert_eq!(principal.user_id(), Some(UserId::new(3)));
    }

    #[test]
    fn test_claims_survive_json() {
        let claims = SessionClaims::issue(&user(), Utc::now()).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        let back: SessionClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_issue_requires_resolved_roles() {
        let mut u = user();
        u.roles = vec![RoleRef::Unresolved(RoleId::new(8))];
        assert_eq!(
            SessionClaims::issue(&u, Utc::now()),
            Err(AccessError::UnresolvedRole(RoleId::new(8)))
        );
    }
}
