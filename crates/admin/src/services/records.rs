//! Content collection records.
//!
//! Each operation is authorized first, then derived fields are recomputed,
//! then the record is stored. Accounts, roles and permissions have their own
//! services and are not reachable through here.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::PgPool;

use tablewise_core::hooks::credit_order;
use tablewise_core::{
    Action, Collection, OrderStatus, Principal, RecordId, RecordRef, RestaurantId, TableId, UserId,
};

use super::access::AccessService;
use super::hooks::{self, FieldError};
use crate::config::AdminConfig;
use crate::db::records::{NewRecord, Page, RecordRepository};
use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::models::Record;

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Whether a collection is served by the generic record endpoints.
#[must_use]
pub const fn is_content_collection(collection: Collection) -> bool {
    !matches!(
        collection,
        Collection::Users | Collection::Roles | Collection::Permissions
    )
}

/// A record to create.
#[derive(Debug, Clone, Default)]
pub struct RecordInput {
    pub restaurant: Option<RestaurantId>,
    pub data: Map<String, Value>,
}

/// Changes to a record. `data` is merged key by key into the stored
/// document; `restaurant` moves the record when set.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub restaurant: Option<RestaurantId>,
    pub data: Map<String, Value>,
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total: i64,
    pub page: Page,
}

/// Collection record service.
pub struct RecordService<'a> {
    access: AccessService<'a>,
    records: RecordRepository<'a>,
    users: UserRepository<'a>,
    config: &'a AdminConfig,
}

impl<'a> RecordService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: &'a AdminConfig) -> Self {
        Self {
            access: AccessService::new(pool),
            records: RecordRepository::new(pool),
            users: UserRepository::new(pool),
            config,
        }
    }

    /// List the records of a collection the principal may read.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if the principal may not read the
    /// collection at all.
    pub async fn list(
        &self,
        principal: &Principal,
        collection: Collection,
        page: Page,
    ) -> Result<RecordPage, AppError> {
        let filter = self.access.list_filter(principal, collection).await?;
        if filter.as_ref().is_some_and(|f| f.matches_nothing()) {
            return Ok(RecordPage {
                records: Vec::new(),
                total: 0,
                page,
            });
        }

        let (mut records, total) = self.records.list(collection, filter.as_ref(), page).await?;
        for record in &mut records {
            self.annotate(record);
        }
        Ok(RecordPage {
            records,
            total,
            page,
        })
    }

    /// Read one record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `NotFound` if the record
    /// doesn't exist and the principal could have seen it.
    pub async fn get(&self, principal: &Principal, collection: Collection, id: RecordId) -> Result<Record, AppError> {
        let mut record = self
            .access
            .authorize_stored(
                principal,
                Action::Read,
                collection,
                id,
                self.records.get(collection, id),
                Record::access_ref,
            )
            .await?;
        self.annotate(&mut record);
        Ok(record)
    }

    /// Create a record.
    ///
    /// Records of collections with owners are owned by the creating user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a missing restaurant or malformed
    /// derived-field inputs, `AppError::Access` if refused.
    pub async fn create(
        &self,
        principal: &Principal,
        collection: Collection,
        input: RecordInput,
    ) -> Result<Record, AppError> {
        let restaurant = match (collection.is_tenant_tagged(), input.restaurant) {
            (true, None) => return Err(AppError::BadRequest("restaurant is required".into())),
            (false, Some(_)) => {
                return Err(AppError::BadRequest(format!(
                    "{collection} records do not belong to a restaurant"
                )));
            }
            (_, restaurant) => restaurant,
        };
        let owner = if collection.policy().ownership {
            principal.user_id()
        } else {
            None
        };

        let target = RecordRef::new(restaurant, owner);
        self.access
            .require(principal, Action::Create, collection, &target, None)
            .await?;

        let mut data = input.data;
        match (collection, restaurant) {
            (Collection::Carts, Some(r)) => {
                data.entry("status").or_insert_with(|| Value::from("active"));
                hooks::derive_cart(&mut data, self.tax_rate(r).await?)?;
            }
            (Collection::Orders, Some(r)) => {
                hooks::derive_order(&mut data, self.tax_rate(r).await?)?;
                let seq = self.next_sequence(collection, r).await?;
                hooks::stamp_order(&mut data, r, Utc::now().date_naive(), seq);
            }
            (Collection::Reservations, Some(r)) => {
                let seq = self.next_sequence(collection, r).await?;
                hooks::stamp_reservation(&mut data, r, Utc::now().date_naive(), seq);
            }
            (Collection::ProductRecipes, _) => hooks::derive_recipe(&mut data)?,
            _ => {}
        }

        let mut record = self
            .records
            .create(
                collection,
                &NewRecord {
                    restaurant,
                    user: owner,
                    data: Value::Object(data),
                },
            )
            .await?;

        if let (Collection::Tables, Some(r)) = (collection, restaurant) {
            let mut data = object(record.data);
            hooks::stamp_table(&mut data, &self.config.base_url, r, TableId::new(record.id.as_i32()));
            record = self
                .records
                .update(collection, record.id, restaurant, &Value::Object(data))
                .await?;
        }

        tracing::info!(
            collection = %collection,
            record_id = %record.id,
            restaurant = ?restaurant.map(|r| r.as_i32()),
            "Record created"
        );
        Ok(record)
    }

    /// Update a record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused (including moving the record
    /// to a restaurant outside the principal's scope), `AppError::BadRequest`
    /// for invalid status transitions or malformed inputs.
    pub async fn update(
        &self,
        principal: &Principal,
        collection: Collection,
        id: RecordId,
        input: RecordUpdate,
    ) -> Result<Record, AppError> {
        let existing = self
            .access
            .authorize_stored(
                principal,
                Action::Update,
                collection,
                id,
                self.records.get(collection, id),
                Record::access_ref,
            )
            .await?;

        let restaurant = match input.restaurant {
            Some(moved) if existing.restaurant != Some(moved) => {
                if !collection.is_tenant_tagged() {
                    return Err(AppError::BadRequest(format!(
                        "{collection} records do not belong to a restaurant"
                    )));
                }
                let target = RecordRef::new(Some(moved), existing.user);
                self.access
                    .require(principal, Action::Update, collection, &target, Some(id))
                    .await?;
                Some(moved)
            }
            _ => existing.restaurant,
        };

        let before = object(existing.data.clone());
        let mut after = before.clone();
        hooks::merge(&mut after, input.data);

        let mut loyalty_credit = None;
        match (collection, restaurant) {
            (Collection::Orders, Some(r)) => {
                keep(&before, &mut after, "orderNumber");
                let transition = hooks::check_order_transition(&before, &after)?;
                hooks::derive_order(&mut after, self.tax_rate(r).await?)?;
                if let (Some((_, OrderStatus::Completed)), Some(customer)) = (transition, existing.user) {
                    loyalty_credit = Some(customer);
                }
            }
            (Collection::Reservations, _) => {
                keep(&before, &mut after, "confirmationCode");
                hooks::check_reservation_transition(&before, &after)?;
            }
            (Collection::Carts, Some(r)) => {
                hooks::derive_cart(&mut after, self.tax_rate(r).await?)?;
            }
            (Collection::ProductRecipes, _) => hooks::derive_recipe(&mut after)?,
            (Collection::Tables, Some(r)) => {
                hooks::stamp_table(&mut after, &self.config.base_url, r, TableId::new(id.as_i32()));
            }
            _ => {}
        }

        if let Some(customer) = loyalty_credit {
            self.credit_loyalty(customer, &mut after).await?;
        }

        let record = self
            .records
            .update(collection, id, restaurant, &Value::Object(after))
            .await?;

        tracing::info!(collection = %collection, record_id = %id, "Record updated");
        Ok(record)
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `NotFound` if the record
    /// doesn't exist and the principal could have seen it.
    pub async fn delete(&self, principal: &Principal, collection: Collection, id: RecordId) -> Result<(), AppError> {
        self.access
            .authorize_stored(
                principal,
                Action::Delete,
                collection,
                id,
                self.records.get(collection, id),
                Record::access_ref,
            )
            .await?;

        self.records.delete(collection, id).await?;
        tracing::info!(collection = %collection, record_id = %id, "Record deleted");
        Ok(())
    }

    /// Tax rate of a restaurant, zero if it has none.
    async fn tax_rate(&self, restaurant: RestaurantId) -> Result<Decimal, AppError> {
        let record = self
            .records
            .get(Collection::Restaurants, RecordId::new(restaurant.as_i32()))
            .await?;
        Ok(record.map_or(Decimal::ZERO, |r| hooks::tax_rate(&r.data)))
    }

    /// Sequence number of the next record a restaurant creates today.
    async fn next_sequence(&self, collection: Collection, restaurant: RestaurantId) -> Result<u32, AppError> {
        let count = self
            .records
            .count_created_on(collection, restaurant, Utc::now().date_naive())
            .await?;
        Ok(u32::try_from(count).map_or(u32::MAX, |c| c.saturating_add(1)))
    }

    async fn credit_loyalty(&self, customer: UserId, order: &mut Map<String, Value>) -> Result<(), AppError> {
        let Some(account) = self.users.get(customer).await? else {
            return Ok(());
        };
        let lifetime = u64::try_from(account.loyalty_points).unwrap_or(0);
        let credit = credit_order(lifetime, hooks::stored_total(order));
        let earned = i64::try_from(credit.earned).unwrap_or(i64::MAX);
        let balance = self.users.add_loyalty_points(customer, earned).await?;

        order.insert("loyaltyPointsEarned".into(), Value::from(credit.earned));
        tracing::info!(
            user_id = %customer,
            earned = credit.earned,
            balance,
            tier = %credit.tier,
            "Loyalty points credited"
        );
        Ok(())
    }

    fn annotate(&self, record: &mut Record) {
        if record.collection == Collection::Carts {
            hooks::mark_expired_cart(&mut record.data, record.updated_at, self.config.cart_ttl, Utc::now());
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Restore a generated field clients may not overwrite.
fn keep(before: &Map<String, Value>, after: &mut Map<String, Value>, key: &str) {
    match before.get(key) {
        Some(value) => {
            after.insert(key.to_owned(), value.clone());
        }
        None => {
            after.remove(key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_collections_are_not_content() {
        assert!(is_content_collection(Collection::Orders));
        assert!(is_content_collection(Collection::Restaurants));
        assert!(!is_content_collection(Collection::Users));
        assert!(!is_content_collection(Collection::Roles));
        assert!(!is_content_collection(Collection::Permissions));
    }

    #[test]
    fn test_keep_restores_generated_fields() {
        let before = object(json!({ "orderNumber": "ORD-1-20260301-0001" }));
        let mut after = object(json!({ "orderNumber": "FAKE", "note": "window seat" }));
        keep(&before, &mut after, "orderNumber");
        assert_eq!(
            Value::Object(after),
            json!({ "orderNumber": "ORD-1-20260301-0001", "note": "window seat" })
        );

        let mut after = object(json!({ "confirmationCode": "RSV-X" }));
        keep(&Map::new(), &mut after, "confirmationCode");
        assert!(after.is_empty());
    }

    #[test]
    fn test_field_errors_are_bad_requests() {
        let mut cart = object(json!({ "items": 3 }));
        let err: AppError = hooks::derive_cart(&mut cart, Decimal::ZERO).unwrap_err().into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
