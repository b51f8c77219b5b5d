//! Integration tests for derived-field hooks.
//!
//! Follows an order from cart to loyalty credit, then checks generated codes
//! and cart expiry.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use tablewise_admin::services::hooks::{derive_order, mark_expired_cart, stored_total};
use tablewise_core::hooks::{
    Adjustments, DEFAULT_CART_TTL, LineItem, LoyaltyTier, cart_totals, credit_order, is_expired,
    order_code, order_totals, reservation_code, table_qr_payload,
};
use tablewise_core::{Money, RecordId, RestaurantId, TableId};

fn lines() -> Vec<LineItem> {
    vec![
        LineItem {
            menu_item: RecordId::new(1),
            name: "Ribeye".into(),
            unit_price: Money::from_cents(1800),
            quantity: 2,
            modifiers_price: Money::ZERO,
        },
        LineItem {
            menu_item: RecordId::new(2),
            name: "Caesar".into(),
            unit_price: Money::from_cents(950),
            quantity: 1,
            modifiers_price: Money::from_cents(150),
        },
    ]
}

// =============================================================================
// Totals and loyalty
// =============================================================================

#[test]
fn test_cart_and_order_totals_agree_before_adjustments() {
    let rate = Decimal::new(8, 2);
    let cart = cart_totals(&lines(), rate);
    let order = order_totals(&lines(), Adjustments::default(), rate);

    assert_eq!(cart.subtotal, Money::from_cents(4700));
    assert_eq!(cart.item_count, 3);
    assert_eq!(cart.total, order.total);
}

#[test]
fn test_order_totals_with_discount_and_tip() {
    let adjustments = Adjustments {
        discount: Money::from_cents(500),
        tip: Money::from_cents(600),
    };
    let totals = order_totals(&lines(), adjustments, Decimal::new(8, 2));

    assert_eq!(totals.subtotal, Money::from_cents(4700));
    assert_eq!(totals.tax, Money::from_cents(336));
    assert_eq!(totals.total, Money::from_cents(5136));
}

#[test]
fn test_total_never_negative() {
    let adjustments = Adjustments {
        discount: Money::from_cents(100_000),
        tip: Money::from_cents(-300),
    };
    let totals = order_totals(&lines(), adjustments, Decimal::new(8, 2));
    assert_eq!(totals.discount, totals.subtotal);
    assert_eq!(totals.total, Money::ZERO);
}

#[test]
fn test_loyalty_credits_at_tier_held_before_order() {
    let total = Money::from_cents(5136);

    let first = credit_order(480, total);
    assert_eq!(first.earned, 51);
    assert_eq!(first.lifetime_points, 531);
    assert_eq!(first.tier, LoyaltyTier::Silver);

    let second = credit_order(first.lifetime_points, total);
    assert_eq!(second.earned, 63);
    assert_eq!(second.lifetime_points, 594);

    let promoted = credit_order(4990, total);
    assert_eq!(promoted.earned, 76);
    assert_eq!(promoted.tier, LoyaltyTier::Platinum);
}

#[test]
fn test_tier_thresholds() {
    assert_eq!(LoyaltyTier::for_points(499), LoyaltyTier::Bronze);
    assert_eq!(LoyaltyTier::for_points(500), LoyaltyTier::Silver);
    assert_eq!(LoyaltyTier::for_points(1500), LoyaltyTier::Gold);
    assert_eq!(LoyaltyTier::for_points(5000), LoyaltyTier::Platinum);
}

#[test]
fn test_order_document_uses_same_arithmetic() {
    let Value::Object(mut order) = json!({
        "items": [
            { "menuItem": 1, "unitPrice": "18.00", "quantity": 2 },
            { "menuItem": 2, "unitPrice": "9.50", "quantity": 1, "modifiersPrice": "1.50" }
        ],
        "discount": "5.00",
        "tip": "6.00"
    }) else {
        panic!("expected an object");
    };
    derive_order(&mut order, Decimal::new(8, 2)).unwrap();
    assert_eq!(stored_total(&order), Money::from_cents(5136));
}

// =============================================================================
// Codes and expiry
// =============================================================================

#[test]
fn test_generated_codes() {
    let restaurant = RestaurantId::new(3);
    let date = NaiveDate::from_ymd_opt(2026, 4, 12).unwrap();

    assert_eq!(order_code(restaurant, date, 42), "ORD-3-20260412-0042");
    assert_eq!(reservation_code(restaurant, date, 7), "RSV-3-260412-007");
    assert_eq!(
        table_qr_payload("https://tablewise.test/", restaurant, TableId::new(8)),
        "https://tablewise.test/r/3/tables/8"
    );
}

#[test]
fn test_cart_expires_after_default_ttl() {
    let touched = Utc.with_ymd_and_hms(2026, 4, 12, 20, 0, 0).unwrap();

    assert!(!is_expired(touched, DEFAULT_CART_TTL, touched + Duration::hours(23)));
    assert!(is_expired(touched, DEFAULT_CART_TTL, touched + Duration::hours(24)));

    let mut cart = json!({ "status": "active" });
    assert!(!mark_expired_cart(&mut cart, touched, DEFAULT_CART_TTL, touched + Duration::hours(1)));
    assert_eq!(cart["status"], "active");
    assert!(mark_expired_cart(&mut cart, touched, DEFAULT_CART_TTL, touched + Duration::days(2)));
    assert_eq!(cart["status"], "expired");
}
