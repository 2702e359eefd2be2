//! Property-based tests for status derivation and the transfer state machine.
//!
//! These tests use proptest to verify invariants across a wide range of inputs,
//! helping to catch edge cases that unit tests might miss.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use medsurplus_api::{
    commands::transfers::generate_tracking_number,
    entities::transfer_request::TransferStatus,
    services::inventory_status::{
        days_until_expiry, derive_status, InventoryStatus, CRITICAL_WINDOW_DAYS,
        SURPLUS_WINDOW_DAYS,
    },
};
use proptest::prelude::*;
use sea_orm::Iterable;

// Strategies for generating test data
fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    // 2020-01-01 .. roughly 2040
    (0i64..630_000_000).prop_map(|secs| Utc.timestamp_opt(1_577_836_800 + secs, 0).unwrap())
}

fn stock_strategy() -> impl Strategy<Value = (i32, i32)> {
    (0i32..10_000).prop_flat_map(|quantity| (Just(quantity), 0..=quantity))
}

fn status_strategy() -> impl Strategy<Value = TransferStatus> {
    prop::sample::select(TransferStatus::iter().collect::<Vec<_>>())
}

fn expiry(now: DateTime<Utc>, offset_days: i64) -> NaiveDate {
    now.date_naive() + Duration::days(offset_days)
}

// Property: status derivation is a pure function of its inputs
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn derive_status_is_deterministic(
        (quantity, reserved) in stock_strategy(),
        offset in -400i64..400,
        now in instant_strategy(),
    ) {
        let expiry_date = expiry(now, offset);
        let first = derive_status(quantity, reserved, expiry_date, now);
        let second = derive_status(quantity, reserved, expiry_date, now);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn time_of_day_does_not_change_status(
        (quantity, reserved) in stock_strategy(),
        offset in -400i64..400,
        now in instant_strategy(),
        seconds in 0u32..86_400,
    ) {
        let midnight = Utc.from_utc_datetime(&now.date_naive().and_hms_opt(0, 0, 0).unwrap());
        let later = midnight + Duration::seconds(i64::from(seconds));
        let expiry_date = expiry(now, offset);
        prop_assert_eq!(
            derive_status(quantity, reserved, expiry_date, midnight),
            derive_status(quantity, reserved, expiry_date, later)
        );
    }

    #[test]
    fn status_matches_first_applicable_rule(
        (quantity, reserved) in stock_strategy(),
        offset in -400i64..400,
        now in instant_strategy(),
    ) {
        let expiry_date = expiry(now, offset);
        let days = days_until_expiry(expiry_date, now);
        prop_assert_eq!(days, offset);

        let expected = if days <= 0 {
            InventoryStatus::Expired
        } else if quantity - reserved <= 0 {
            InventoryStatus::Reserved
        } else if days <= CRITICAL_WINDOW_DAYS {
            InventoryStatus::Critical
        } else if days <= SURPLUS_WINDOW_DAYS {
            InventoryStatus::Surplus
        } else {
            InventoryStatus::Available
        };
        prop_assert_eq!(derive_status(quantity, reserved, expiry_date, now), expected);
    }

    #[test]
    fn reserving_more_never_frees_an_item(
        (quantity, reserved) in stock_strategy(),
        extra in 0i32..100,
        offset in -400i64..400,
        now in instant_strategy(),
    ) {
        let expiry_date = expiry(now, offset);
        let before = derive_status(quantity, reserved, expiry_date, now);
        let after = derive_status(quantity, (reserved + extra).min(quantity), expiry_date, now);
        if before == InventoryStatus::Reserved {
            prop_assert_eq!(after, InventoryStatus::Reserved);
        }
        if after.is_offered() {
            prop_assert_eq!(before, after);
        }
    }
}

// Property: the transfer state machine only moves forward
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn terminal_statuses_have_no_exits(from in status_strategy(), to in status_strategy()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn nothing_returns_to_pending(from in status_strategy()) {
        prop_assert!(!from.can_transition_to(TransferStatus::Pending));
        prop_assert!(!from.can_transition_to(from));
    }

    #[test]
    fn every_open_status_can_be_cancelled(from in status_strategy()) {
        prop_assert_eq!(
            from.can_transition_to(TransferStatus::Cancelled),
            !from.is_terminal()
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn tracking_numbers_are_well_formed(_seed in any::<u8>()) {
        let tracking = generate_tracking_number();
        prop_assert!(tracking.starts_with("TRF-"));
        prop_assert_eq!(tracking.len(), 16);
        prop_assert!(tracking[4..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
