//! Lifecycle status enums for orders and reservations.
//!
//! Status changes arrive as ordinary field updates, so the transition tables
//! live here and the admin write path checks them before persisting.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Served,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether an order may move from `self` to `next`.
    ///
    /// Staying in the same status is always allowed. Orders can be cancelled
    /// until they are served.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::{Cancelled, Completed, Confirmed, Pending, Preparing, Ready, Served};

        if self as u8 == next as u8 {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Confirmed | Cancelled)
                | (Confirmed, Preparing | Cancelled)
                | (Preparing, Ready | Cancelled)
                | (Ready, Served | Cancelled)
                | (Served, Completed)
        )
    }

    /// Whether the order can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Reservation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Seated,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    /// Whether a reservation may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ReservationStatus::{Cancelled, Completed, Confirmed, NoShow, Pending, Seated};

        if self as u8 == next as u8 {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Confirmed | Cancelled)
                | (Confirmed, Seated | Cancelled | NoShow)
                | (Seated, Completed)
        )
    }
}
