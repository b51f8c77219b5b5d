//! Derived fields of collection documents.
//!
//! Record payloads are free-form JSON; the functions here read the inputs
//! a collection's derived fields depend on and write the recomputed values
//! back into the document. They run after access has been granted and never
//! decide access themselves.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use tablewise_core::hooks::{
    Adjustments, Ingredient, LineItem, cart_totals, is_expired, order_code, order_totals,
    recipe_cost, reservation_code, table_qr_payload,
};
use tablewise_core::{Money, OrderStatus, ReservationStatus, RestaurantId, TableId};

/// Error in a document's derived-field inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field `{field}`: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl ToString) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

/// Read an optional field, failing if it is present but malformed.
fn field<T: DeserializeOwned>(data: &Map<String, Value>, name: &'static str) -> Result<Option<T>, FieldError> {
    match data.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| FieldError::new(name, e)),
    }
}

fn set<T: serde::Serialize>(data: &mut Map<String, Value>, name: &str, value: T) {
    data.insert(
        name.to_owned(),
        serde_json::to_value(value).unwrap_or(Value::Null),
    );
}

/// Tax rate configured on a restaurant document (`taxRate`, e.g. `0.0825`).
///
/// Missing or malformed rates count as zero.
#[must_use]
pub fn tax_rate(restaurant: &Value) -> Decimal {
    restaurant
        .get("taxRate")
        .and_then(|v| serde_json::from_value::<Decimal>(v.clone()).ok())
        .filter(|rate| !rate.is_sign_negative())
        .unwrap_or_default()
}

/// Recompute `subtotal`, `tax`, `total` and `itemCount` of a cart from its
/// `items`.
///
/// # Errors
///
/// Returns a [`FieldError`] if `items` is malformed.
pub fn derive_cart(data: &mut Map<String, Value>, tax_rate: Decimal) -> Result<(), FieldError> {
    let lines: Vec<LineItem> = field(data, "items")?.unwrap_or_default();
    let totals = cart_totals(&lines, tax_rate);
    set(data, "subtotal", totals.subtotal);
    set(data, "tax", totals.tax);
    set(data, "total", totals.total);
    set(data, "itemCount", totals.item_count);
    Ok(())
}

/// Recompute the money fields of an order from its `items`, `discount` and
/// `tip`. The stored discount is the capped one.
///
/// # Errors
///
/// Returns a [`FieldError`] if an input is malformed.
pub fn derive_order(data: &mut Map<String, Value>, tax_rate: Decimal) -> Result<(), FieldError> {
    let lines: Vec<LineItem> = field(data, "items")?.unwrap_or_default();
    let adjustments = Adjustments {
        discount: field(data, "discount")?.unwrap_or_default(),
        tip: field(data, "tip")?.unwrap_or_default(),
    };
    let totals = order_totals(&lines, adjustments, tax_rate);
    set(data, "subtotal", totals.subtotal);
    set(data, "discount", totals.discount);
    set(data, "tax", totals.tax);
    set(data, "tip", totals.tip);
    set(data, "total", totals.total);
    Ok(())
}

/// Recompute `totalCost`, `costPerPortion` and `foodCostPercent` of a recipe
/// from its `ingredients`, `portions` and `menuPrice`.
///
/// # Errors
///
/// Returns a [`FieldError`] if an input is malformed.
pub fn derive_recipe(data: &mut Map<String, Value>) -> Result<(), FieldError> {
    let ingredients: Vec<Ingredient> = field(data, "ingredients")?.unwrap_or_default();
    let portions: u32 = field(data, "portions")?.unwrap_or(1);
    let menu_price: Option<Money> = field(data, "menuPrice")?;
    let cost = recipe_cost(&ingredients, portions, menu_price);
    set(data, "totalCost", cost.total_cost);
    set(data, "costPerPortion", cost.cost_per_portion);
    set(data, "foodCostPercent", cost.food_cost_percent);
    Ok(())
}

/// Stamp a new order with its pending status and order code.
pub fn stamp_order(data: &mut Map<String, Value>, restaurant: RestaurantId, date: NaiveDate, seq: u32) {
    set(data, "status", OrderStatus::Pending);
    set(data, "orderNumber", order_code(restaurant, date, seq));
}

/// Stamp a new reservation with its pending status and confirmation code.
pub fn stamp_reservation(
    data: &mut Map<String, Value>,
    restaurant: RestaurantId,
    date: NaiveDate,
    seq: u32,
) {
    set(data, "status", ReservationStatus::Pending);
    set(data, "confirmationCode", reservation_code(restaurant, date, seq));
}

/// Stamp a table with its QR payload.
pub fn stamp_table(data: &mut Map<String, Value>, base_url: &str, restaurant: RestaurantId, table: TableId) {
    set(data, "qrCode", table_qr_payload(base_url, restaurant, table));
}

/// Order status stored in a document, if any.
///
/// # Errors
///
/// Returns a [`FieldError`] if `status` is not an order status.
pub fn order_status(data: &Map<String, Value>) -> Result<Option<OrderStatus>, FieldError> {
    field(data, "status")
}

/// Reservation status stored in a document, if any.
///
/// # Errors
///
/// Returns a [`FieldError`] if `status` is not a reservation status.
pub fn reservation_status(data: &Map<String, Value>) -> Result<Option<ReservationStatus>, FieldError> {
    field(data, "status")
}

/// Check an order status change between two versions of a document.
///
/// # Errors
///
/// Returns a [`FieldError`] for an unknown status or a forbidden transition.
pub fn check_order_transition(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> Result<Option<(OrderStatus, OrderStatus)>, FieldError> {
    let from = order_status(before)?.unwrap_or_default();
    let to = order_status(after)?.unwrap_or_default();
    if !from.can_transition_to(to) {
        return Err(FieldError::new(
            "status",
            format!("cannot move an order from {from:?} to {to:?}"),
        ));
    }
    Ok((from != to).then_some((from, to)))
}

/// Check a reservation status change between two versions of a document.
///
/// # Errors
///
/// Returns a [`FieldError`] for an unknown status or a forbidden transition.
pub fn check_reservation_transition(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> Result<(), FieldError> {
    let from = reservation_status(before)?.unwrap_or_default();
    let to = reservation_status(after)?.unwrap_or_default();
    if !from.can_transition_to(to) {
        return Err(FieldError::new(
            "status",
            format!("cannot move a reservation from {from:?} to {to:?}"),
        ));
    }
    Ok(())
}

/// Order total as stored by [`derive_order`].
#[must_use]
pub fn stored_total(data: &Map<String, Value>) -> Money {
    field(data, "total").ok().flatten().unwrap_or_default()
}

/// Mark a cart document expired when it has been idle longer than `ttl`.
///
/// Returns whether the cart is expired.
pub fn mark_expired_cart(
    data: &mut Value,
    last_activity: DateTime<Utc>,
    ttl: chrono::Duration,
    now: DateTime<Utc>,
) -> bool {
    if !is_expired(last_activity, ttl, now) {
        return false;
    }
    if let Value::Object(map) = data {
        set(map, "status", "expired");
    }
    true
}

/// Shallow-merge `patch` into `base`; `null` values remove a key.
pub fn merge(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            base.remove(&key);
        } else {
            base.insert(key, value);
        }
    }
}
