//! Derived-field hooks.
//!
//! Pure functions that fill in computed fields of records after a write has
//! been authorized: totals, recipe costing, loyalty points and generated
//! codes. They never make access decisions.

pub mod cart;
pub mod codes;
pub mod loyalty;
pub mod pricing;
pub mod recipe;

pub use cart::{DEFAULT_CART_TTL, expires_at, is_expired};
pub use codes::{order_code, reservation_code, table_qr_payload};
pub use loyalty::{LoyaltyTier, LoyaltyUpdate, credit_order, points_earned};
pub use pricing::{Adjustments, CartTotals, LineItem, OrderTotals, cart_totals, order_totals};
pub use recipe::{Ingredient, RecipeCost, recipe_cost};
