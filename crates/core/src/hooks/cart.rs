//! Cart expiry.

use chrono::{DateTime, Duration, Utc};

/// Default inactivity window after which a cart is abandoned.
pub const DEFAULT_CART_TTL: Duration = Duration::hours(24);

/// When a cart last touched at `last_activity` expires.
#[must_use]
pub fn expires_at(last_activity: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    last_activity + ttl
}

/// Whether the cart has expired at `now`. A cart expires exactly at its
/// deadline.
#[must_use]
pub fn is_expired(last_activity: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    now >= expires_at(last_activity, ttl)
}
