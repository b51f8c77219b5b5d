//! Permission, role and user reference data.
//!
//! Permissions are atomic grants of one [`Action`] on one [`Resource`]. Roles
//! bundle permissions; users hold roles and a set of restaurant assignments.
//! References between them are tagged unions so that code which has only
//! fetched IDs cannot accidentally hand them to the evaluator.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Email, PermissionId, RestaurantId, RoleId, UserId};

/// Name of the protected system role.
pub const ADMINISTRATOR: &str = "Administrator";

/// Whether a role name denotes the protected Administrator role.
#[must_use]
pub fn is_administrator_name(name: &str) -> bool {
    name == ADMINISTRATOR
}

/// An action a permission can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "app.permission_action", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Execute,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::Execute,
    ];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("invalid action: {s}"))
    }
}

/// A resource tag that permissions are granted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "app.permission_resource", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Orders,
    Menu,
    Inventory,
    Reports,
    Users,
    Tables,
    Reservations,
    Payments,
    Kitchen,
    Settings,
}

impl Resource {
    /// Every resource, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Orders,
        Self::Menu,
        Self::Inventory,
        Self::Reports,
        Self::Users,
        Self::Tables,
        Self::Reservations,
        Self::Payments,
        Self::Kitchen,
        Self::Settings,
    ];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Menu => "menu",
            Self::Inventory => "inventory",
            Self::Reports => "reports",
            Self::Users => "users",
            Self::Tables => "tables",
            Self::Reservations => "reservations",
            Self::Payments => "payments",
            Self::Kitchen => "kitchen",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("invalid resource: {s}"))
    }
}

/// The capability half of a permission: one action on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub action: Action,
    pub resource: Resource,
}

impl Grant {
    #[must_use]
    pub const fn new(action: Action, resource: Resource) -> Self {
        Self { action, resource }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// A named permission from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub action: Action,
    pub resource: Resource,
    #[serde(default)]
    pub description: String,
}

impl Permission {
    #[must_use]
    pub const fn grant(&self) -> Grant {
        Grant::new(self.action, self.resource)
    }
}

/// A permission reference as found on a role record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRef {
    Resolved(Permission),
    Unresolved(PermissionId),
}

impl PermissionRef {
    #[must_use]
    pub const fn id(&self) -> PermissionId {
        match self {
            Self::Resolved(p) => p.id,
            Self::Unresolved(id) => *id,
        }
    }
}

/// A role: a named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub permissions: Vec<PermissionRef>,
    pub is_active: bool,
    /// Marks the protected system role. It stays the Administrator role
    /// when an administrator renames it.
    #[serde(default)]
    pub system: bool,
}

impl Role {
    /// Whether this is the protected Administrator role.
    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.system || is_administrator_name(&self.name)
    }
}

/// A role reference as found on a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    Resolved(Role),
    Unresolved(RoleId),
}

impl RoleRef {
    #[must_use]
    pub const fn id(&self) -> RoleId {
        match self {
            Self::Resolved(r) => r.id,
            Self::Unresolved(id) => *id,
        }
    }
}

/// A platform account.
///
/// A user with no roles and no restaurant assignments is a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub roles: Vec<RoleRef>,
    pub restaurants: Vec<RestaurantId>,
    pub is_active: bool,
}

impl User {
    /// Whether the user has no staff capability at all.
    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.roles.is_empty() && self.restaurants.is_empty()
    }
}
