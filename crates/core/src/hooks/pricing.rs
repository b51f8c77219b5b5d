//! Cart and order totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, RecordId};

/// A priced line on a cart or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub menu_item: RecordId,
    #[serde(default)]
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    /// Extra charge per unit for selected modifiers.
    #[serde(default)]
    pub modifiers_price: Money,
}

impl LineItem {
    #[must_use]
    pub fn line_total(&self) -> Money {
        (self.unit_price + self.modifiers_price) * self.quantity
    }
}

/// Recomputed cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub item_count: u32,
}

/// Sum lines and apply the restaurant's tax rate (e.g. `0.0825`).
#[must_use]
pub fn cart_totals(lines: &[LineItem], tax_rate: Decimal) -> CartTotals {
    let subtotal: Money = lines.iter().map(LineItem::line_total).sum();
    let tax = subtotal.scale(tax_rate);
    CartTotals {
        subtotal,
        tax,
        total: subtotal + tax,
        item_count: lines.iter().map(|l| l.quantity).sum(),
    }
}

/// Order-level adjustments entered by staff or the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustments {
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tip: Money,
}

/// Recomputed order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub tip: Money,
    pub total: Money,
}

/// Compute order totals.
///
/// The discount is capped at the subtotal, tax applies to the discounted
/// subtotal, and the tip is added after tax. Negative adjustments count as zero.
#[must_use]
pub fn order_totals(lines: &[LineItem], adjustments: Adjustments, tax_rate: Decimal) -> OrderTotals {
    let subtotal: Money = lines.iter().map(LineItem::line_total).sum();
    let discount = clamp_non_negative(adjustments.discount).min(subtotal);
    let taxable = subtotal.saturating_sub(discount);
    let tax = taxable.scale(tax_rate);
    let tip = clamp_non_negative(adjustments.tip);

    OrderTotals {
        subtotal,
        discount,
        tax,
        tip,
        total: taxable + tax + tip,
    }
}

fn clamp_non_negative(amount: Money) -> Money {
    if amount.is_negative() { Money::ZERO } else { amount }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(cents: i64, quantity: u32) -> LineItem {
        LineItem {
            menu_item: RecordId::new(1),
            name: "Margherita".into(),
            unit_price: Money::from_cents(cents),
            quantity,
            modifiers_price: Money::ZERO,
        }
    }

    #[test]
    fn test_cart_totals_with_tax() {
        let totals = cart_totals(&[line(1200, 2), line(350, 1)], Decimal::new(8, 2));
        assert_eq!(totals.subtotal, Money::from_cents(2750));
        assert_eq!(totals.tax, Money::from_cents(220));
        assert_eq!(totals.total, Money::from_cents(2970));
        assert_eq!(totals.item_count, 3);
    }

    #[test]
    fn test_modifiers_are_charged_per_unit() {
        let mut l = line(1000, 3);
        l.modifiers_price = Money::from_cents(150);
        assert_eq!(l.line_total(), Money::from_cents(3450));
    }

    #[test]
    fn test_empty_cart_is_zero() {
        let totals = cart_totals(&[], Decimal::new(1, 1));
        assert_eq!(totals.total, Money::ZERO);
        assert_eq!(totals.item_count, 0);
    }

    #[test]
    fn test_order_discount_capped_and_tip_after_tax() {
        let adjustments = Adjustments {
            discount: Money::from_cents(5000),
            tip: Money::from_cents(300),
        };
        let totals = order_totals(&[line(2000, 1)], adjustments, Decimal::new(10, 2));
        assert_eq!(totals.discount, Money::from_cents(2000));
        assert_eq!(totals.tax, Money::ZERO);
        assert_eq!(totals.total, Money::from_cents(300));
    }

    #[test]
    fn test_order_tax_on_discounted_subtotal() {
        let adjustments = Adjustments {
            discount: Money::from_cents(1000),
            tip: Money::from_cents(-500),
        };
        let totals = order_totals(&[line(5000, 1)], adjustments, Decimal::new(5, 2));
        assert_eq!(totals.tax, Money::from_cents(200));
        assert_eq!(totals.tip, Money::ZERO);
        assert_eq!(totals.total, Money::from_cents(4200));
    }
}
