//! Derivation of an inventory item's lifecycle status.
//!
//! Status is never stored. It is computed from the item's quantities, its
//! expiry date and the instant of the read, so the same inputs always give the
//! same answer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Items expiring within this many days are `critical`.
pub const CRITICAL_WINDOW_DAYS: i64 = 30;
/// Items expiring within this many days are `surplus`.
pub const SURPLUS_WINDOW_DAYS: i64 = 90;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InventoryStatus {
    Available,
    Surplus,
    Critical,
    Expired,
    Reserved,
}

impl InventoryStatus {
    /// Whether an item in this status shows up on the surplus marketplace.
    pub fn is_offered(self) -> bool {
        matches!(self, Self::Surplus | Self::Critical)
    }
}

/// Whole days from the calendar date of `now` until `expiry_date`.
/// Negative once the date has passed.
pub fn days_until_expiry(expiry_date: NaiveDate, now: DateTime<Utc>) -> i64 {
    (expiry_date - now.date_naive()).num_days()
}

/// Maps an item's attributes at instant `now` to its status. First match wins.
pub fn derive_status(
    quantity: i32,
    reserved_quantity: i32,
    expiry_date: NaiveDate,
    now: DateTime<Utc>,
) -> InventoryStatus {
    let days = days_until_expiry(expiry_date, now);
    if days <= 0 {
        InventoryStatus::Expired
    } else if quantity - reserved_quantity <= 0 {
        InventoryStatus::Reserved
    } else if days <= CRITICAL_WINDOW_DAYS {
        InventoryStatus::Critical
    } else if days <= SURPLUS_WINDOW_DAYS {
        InventoryStatus::Surplus
    } else {
        InventoryStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[rstest]
    #[case(0, InventoryStatus::Expired)]
    #[case(-5, InventoryStatus::Expired)]
    #[case(1, InventoryStatus::Critical)]
    #[case(30, InventoryStatus::Critical)]
    #[case(31, InventoryStatus::Surplus)]
    #[case(90, InventoryStatus::Surplus)]
    #[case(91, InventoryStatus::Available)]
    fn window_boundaries(#[case] offset_days: i64, #[case] expected: InventoryStatus) {
        let now = noon();
        let expiry = now.date_naive() + Duration::days(offset_days);
        assert_eq!(derive_status(100, 0, expiry, now), expected);
    }

    #[test]
    fn fully_reserved_wins_over_expiry_windows() {
        let now = noon();
        let expiry = now.date_naive() + Duration::days(10);
        assert_eq!(derive_status(100, 30, expiry, now), InventoryStatus::Critical);
        assert_eq!(derive_status(100, 100, expiry, now), InventoryStatus::Reserved);
        assert_eq!(derive_status(0, 0, expiry, now), InventoryStatus::Reserved);
    }

    #[test]
    fn expired_wins_over_reserved() {
        let now = noon();
        assert_eq!(
            derive_status(10, 10, now.date_naive(), now),
            InventoryStatus::Expired
        );
    }

    #[test]
    fn expiry_is_compared_on_calendar_date() {
        let late = Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 59).unwrap();
        let tomorrow = late.date_naive() + Duration::days(1);
        assert_eq!(days_until_expiry(tomorrow, late), 1);
        assert_eq!(derive_status(5, 0, tomorrow, late), InventoryStatus::Critical);
    }

    #[test]
    fn tokens_match_wire_format() {
        assert_eq!(InventoryStatus::Surplus.to_string(), "surplus");
        assert_eq!(
            serde_json::to_string(&InventoryStatus::Reserved).unwrap(),
            "\"reserved\""
        );
        assert!(InventoryStatus::Critical.is_offered());
        assert!(!InventoryStatus::Available.is_offered());
    }
}
