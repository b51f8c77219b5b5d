//! Static per-collection access policy.
//!
//! Each collection declares which permission resource gates it, which actions
//! are open to everyone, which actions are confined to the principal's
//! restaurants, and whether record owners may act on their own records.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::{Action, Resource};

/// A collection exposed by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Orders,
    MenuItems,
    Restaurants,
    Tables,
    Reservations,
    Reviews,
    Carts,
    InventoryItems,
    ProductRecipes,
    Users,
    Roles,
    Permissions,
}

/// Policy row for a single collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionPolicy {
    /// Permission resource that gates staff access.
    pub resource: Resource,
    /// Actions anyone may perform, authenticated or not.
    pub public: &'static [Action],
    /// Actions confined to records of the principal's restaurants.
    pub tenant_scoped: &'static [Action],
    /// Whether a record's owner may act on it without a permission.
    pub ownership: bool,
}

impl CollectionPolicy {
    #[must_use]
    pub fn is_public(&self, action: Action) -> bool {
        self.public.contains(&action)
    }

    #[must_use]
    pub fn is_tenant_scoped(&self, action: Action) -> bool {
        self.tenant_scoped.contains(&action)
    }
}

use Action::{Create, Delete, Read, Update};

const NONE: &[Action] = &[];
const READ_WRITE: &[Action] = &[Read, Update, Delete];
const CRUD: &[Action] = &[Read, Create, Update, Delete];

impl Collection {
    /// Every collection, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Orders,
        Self::MenuItems,
        Self::Restaurants,
        Self::Tables,
        Self::Reservations,
        Self::Reviews,
        Self::Carts,
        Self::InventoryItems,
        Self::ProductRecipes,
        Self::Users,
        Self::Roles,
        Self::Permissions,
    ];

    /// URL slug, e.g. `menu-items`.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::MenuItems => "menu-items",
            Self::Restaurants => "restaurants",
            Self::Tables => "tables",
            Self::Reservations => "reservations",
            Self::Reviews => "reviews",
            Self::Carts => "carts",
            Self::InventoryItems => "inventory-items",
            Self::ProductRecipes => "product-recipes",
            Self::Users => "users",
            Self::Roles => "roles",
            Self::Permissions => "permissions",
        }
    }

    /// The policy row for this collection.
    #[must_use]
    pub const fn policy(self) -> CollectionPolicy {
        match self {
            Self::Orders => CollectionPolicy {
                resource: Resource::Orders,
                public: &[Create],
                tenant_scoped: READ_WRITE,
                ownership: false,
            },
            Self::MenuItems => CollectionPolicy {
                resource: Resource::Menu,
                public: &[Read],
                tenant_scoped: &[Update],
                ownership: false,
            },
            Self::Restaurants => CollectionPolicy {
                resource: Resource::Settings,
                public: &[Read],
                tenant_scoped: NONE,
                ownership: false,
            },
            Self::Tables => CollectionPolicy {
                resource: Resource::Tables,
                public: &[Read],
                tenant_scoped: READ_WRITE,
                ownership: false,
            },
            Self::Reservations => CollectionPolicy {
                resource: Resource::Reservations,
                public: &[Create],
                tenant_scoped: READ_WRITE,
                ownership: false,
            },
            Self::Reviews => CollectionPolicy {
                resource: Resource::Menu,
                public: &[Read, Create],
                tenant_scoped: NONE,
                ownership: true,
            },
            Self::Carts => CollectionPolicy {
                resource: Resource::Orders,
                public: &[Create],
                tenant_scoped: NONE,
                ownership: true,
            },
            Self::InventoryItems | Self::ProductRecipes => CollectionPolicy {
                resource: Resource::Inventory,
                public: NONE,
                tenant_scoped: CRUD,
                ownership: false,
            },
            Self::Users => CollectionPolicy {
                resource: Resource::Users,
                public: NONE,
                tenant_scoped: NONE,
                ownership: true,
            },
            Self::Roles | Self::Permissions => CollectionPolicy {
                resource: Resource::Settings,
                public: NONE,
                tenant_scoped: NONE,
                ownership: false,
            },
        }
    }

    /// Whether records of this collection carry a restaurant tag.
    #[must_use]
    pub const fn is_tenant_tagged(self) -> bool {
        !matches!(self, Self::Users | Self::Roles | Self::Permissions | Self::Restaurants)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.slug() == s)
            .ok_or_else(|| format!("unknown collection: {s}"))
    }
}
