//! Collection records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use tablewise_core::{Collection, RecordId, RecordRef, RestaurantId, UserId};

/// A record of one of the content collections.
///
/// Access-relevant fields live in columns; everything else is the JSON
/// `data` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub collection: Collection,
    pub restaurant: Option<RestaurantId>,
    pub user: Option<UserId>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// The fields the access evaluator looks at.
    #[must_use]
    pub const fn access_ref(&self) -> RecordRef {
        RecordRef::new(self.restaurant, self.user)
    }
}
