//! Product recipe costing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, RecordId};

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub inventory_item: RecordId,
    /// Quantity in the inventory item's unit.
    pub quantity: Decimal,
    /// Cost of one unit of the inventory item.
    pub unit_cost: Money,
}

/// Derived cost fields of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCost {
    pub total_cost: Money,
    pub cost_per_portion: Money,
    /// Cost per portion as a percentage of the menu price, if one is set.
    pub food_cost_percent: Option<Decimal>,
}

/// Cost a recipe producing `portions` portions, sold at `menu_price`.
///
/// A yield of zero is treated as one portion.
#[must_use]
pub fn recipe_cost(ingredients: &[Ingredient], portions: u32, menu_price: Option<Money>) -> RecipeCost {
    let total_cost = Money::new(
        ingredients
            .iter()
            .map(|i| i.quantity * i.unit_cost.amount())
            .sum(),
    );
    let cost_per_portion = Money::new(total_cost.amount() / Decimal::from(portions.max(1)));
    let food_cost_percent = menu_price
        .filter(|p| p.amount() > Decimal::ZERO)
        .map(|p| (cost_per_portion.amount() * Decimal::ONE_HUNDRED / p.amount()).round_dp(1));

    RecipeCost {
        total_cost,
        cost_per_portion,
        food_cost_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(quantity: Decimal, cents: i64) -> Ingredient {
        Ingredient {
            inventory_item: RecordId::new(1),
            quantity,
            unit_cost: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_recipe_cost_per_portion_and_percent() {
        let cost = recipe_cost(
            &[
                ingredient(Decimal::new(5, 1), 800),
                ingredient(Decimal::from(2), 150),
            ],
            4,
            Some(Money::from_cents(1400)),
        );
        assert_eq!(cost.total_cost, Money::from_cents(700));
        assert_eq!(cost.cost_per_portion, Money::from_cents(175));
        assert_eq!(cost.food_cost_percent, Some(Decimal::new(125, 1)));
    }

    #[test]
    fn test_zero_yield_and_missing_price() {
        let cost = recipe_cost(&[ingredient(Decimal::ONE, 300)], 0, None);
        assert_eq!(cost.cost_per_portion, Money::from_cents(300));
        assert_eq!(cost.food_cost_percent, None);
    }
}
