//! Human-facing codes for orders, reservations and table QR stickers.

use chrono::NaiveDate;

use crate::types::{RestaurantId, TableId};

/// Order code, e.g. `ORD-3-20260412-0042`.
///
/// `seq` is the order's sequence number within the restaurant and day.
#[must_use]
pub fn order_code(restaurant: RestaurantId, date: NaiveDate, seq: u32) -> String {
    format!("ORD-{restaurant}-{}-{seq:04}", date.format("%Y%m%d"))
}

/// Reservation confirmation code, e.g. `RSV-3-260412-007`.
#[must_use]
pub fn reservation_code(restaurant: RestaurantId, date: NaiveDate, seq: u32) -> String {
    format!("RSV-{restaurant}-{}-{seq:03}", date.format("%y%m%d"))
}

/// URL encoded into a table's QR sticker.
#[must_use]
pub fn table_qr_payload(base_url: &str, restaurant: RestaurantId, table: TableId) -> String {
    format!("{}/r/{restaurant}/tables/{table}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 12).unwrap()
    }

    #[test]
    fn test_order_code_format() {
        assert_eq!(order_code(RestaurantId::new(3), date(), 42), "ORD-3-20260412-0042");
    }

    #[test]
    fn test_reservation_code_format() {
        assert_eq!(reservation_code(RestaurantId::new(3), date(), 7), "RSV-3-260412-007");
    }

    #[test]
    fn test_qr_payload_trims_trailing_slash() {
        assert_eq!(
            table_qr_payload("https://eat.example.com/", RestaurantId::new(3), TableId::new(12)),
            "https://eat.example.com/r/3/tables/12"
        );
    }
}
