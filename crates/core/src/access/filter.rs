//! Tenant and ownership predicates, and the filters they compile to.
//!
//! A [`Predicate`] is what the evaluator decides; a [`RecordFilter`] is what
//! the data layer applies. Keeping the two apart lets the data layer render a
//! filter as SQL or as a `where` document without knowing access rules.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{RestaurantId, UserId};

/// The access-relevant fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordRef {
    /// Tenant tag.
    #[serde(default)]
    pub restaurant: Option<RestaurantId>,
    /// Owning user, for collections with ownership.
    #[serde(default)]
    pub user: Option<UserId>,
}

impl RecordRef {
    #[must_use]
    pub const fn new(restaurant: Option<RestaurantId>, user: Option<UserId>) -> Self {
        Self { restaurant, user }
    }

    #[must_use]
    pub const fn in_restaurant(restaurant: RestaurantId) -> Self {
        Self::new(Some(restaurant), None)
    }

    #[must_use]
    pub const fn owned_by(user: UserId) -> Self {
        Self::new(None, Some(user))
    }
}

/// A condition a record must satisfy for a conditional allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// The record's restaurant is one of these.
    TenantIn(Vec<RestaurantId>),
    /// The record belongs to this user.
    OwnedBy(UserId),
}

impl Predicate {
    /// Test a concrete record.
    ///
    /// Records without the relevant field never match.
    #[must_use]
    pub fn matches(&self, record: &RecordRef) -> bool {
        match self {
            Self::TenantIn(ids) => record.restaurant.is_some_and(|r| ids.contains(&r)),
            Self::OwnedBy(user) => record.user == Some(*user),
        }
    }

    /// Compile into a data-layer filter.
    #[must_use]
    pub fn compile(&self) -> RecordFilter {
        match self {
            Self::TenantIn(ids) => {
                let mut ids: Vec<i32> = ids.iter().map(RestaurantId::as_i32).collect();
                ids.sort_unstable();
                ids.dedup();
                RecordFilter {
                    field: FilterField::Restaurant,
                    op: FilterOp::In(ids),
                }
            }
            Self::OwnedBy(user) => RecordFilter {
                field: FilterField::User,
                op: FilterOp::Equals(user.as_i32()),
            },
        }
    }
}

/// Record field a filter constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Restaurant,
    User,
}

impl FilterField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::User => "user",
        }
    }
}

/// Comparison applied to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    In(Vec<i32>),
    Equals(i32),
}

/// A query constraint handed to the data layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub field: FilterField,
    pub op: FilterOp,
}

impl RecordFilter {
    /// Whether no record can satisfy the filter (an empty `in` list).
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        matches!(&self.op, FilterOp::In(ids) if ids.is_empty())
    }

    /// Test a concrete record, mirroring what the data layer would do.
    #[must_use]
    pub fn matches(&self, record: &RecordRef) -> bool {
        let value = match self.field {
            FilterField::Restaurant => record.restaurant.map(|r| r.as_i32()),
            FilterField::User => record.user.map(|u| u.as_i32()),
        };
        match (&self.op, value) {
            (FilterOp::In(ids), Some(v)) => ids.contains(&v),
            (FilterOp::Equals(id), Some(v)) => *id == v,
            (_, None) => false,
        }
    }

    /// Render as a `where` document, e.g. `{"restaurant":{"in":[1,2]}}`.
    #[must_use]
    pub fn to_where(&self) -> Value {
        let condition = match &self.op {
            FilterOp::In(ids) => json!({ "in": ids }),
            FilterOp::Equals(id) => json!({ "equals": id }),
        };
        let mut document = serde_json::Map::new();
        document.insert(self.field.as_str().to_owned(), condition);
        Value::Object(document)
    }
}
