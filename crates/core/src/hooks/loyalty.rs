//! Loyalty tiers and points.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Customer loyalty tier, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    /// All tiers from lowest to highest.
    pub const ALL: [Self; 4] = [Self::Bronze, Self::Silver, Self::Gold, Self::Platinum];

    /// Lifetime points needed to reach this tier.
    #[must_use]
    pub const fn threshold(self) -> u64 {
        match self {
            Self::Bronze => 0,
            Self::Silver => 500,
            Self::Gold => 1500,
            Self::Platinum => 5000,
        }
    }

    /// Points multiplier applied to each order.
    #[must_use]
    pub fn multiplier(self) -> Decimal {
        match self {
            Self::Bronze => Decimal::ONE,
            Self::Silver => Decimal::new(125, 2),
            Self::Gold => Decimal::new(15, 1),
            Self::Platinum => Decimal::TWO,
        }
    }

    /// The tier a customer with `lifetime_points` belongs to.
    #[must_use]
    pub fn for_points(lifetime_points: u64) -> Self {
        Self::ALL
            .into_iter()
            .rev()
            .find(|tier| lifetime_points >= tier.threshold())
            .unwrap_or(Self::Bronze)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

impl fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points earned for an order: whole currency units of the total times the
/// tier multiplier, rounded down. Negative totals earn nothing.
#[must_use]
pub fn points_earned(order_total: Money, tier: LoyaltyTier) -> u64 {
    let units = order_total.amount().floor();
    if units <= Decimal::ZERO {
        return 0;
    }
    (units * tier.multiplier()).floor().to_u64().unwrap_or(0)
}

/// Loyalty state after crediting an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyUpdate {
    pub earned: u64,
    pub lifetime_points: u64,
    pub tier: LoyaltyTier,
}

/// Credit a completed order to a customer with `lifetime_points`.
///
/// Points are earned at the tier held before the order; the new tier reflects
/// the updated balance.
#[must_use]
pub fn credit_order(lifetime_points: u64, order_total: Money) -> LoyaltyUpdate {
    let earned = points_earned(order_total, LoyaltyTier::for_points(lifetime_points));
    let lifetime_points = lifetime_points.saturating_add(earned);
    LoyaltyUpdate {
        earned,
        lifetime_points,
        tier: LoyaltyTier::for_points(lifetime_points),
    }
}
