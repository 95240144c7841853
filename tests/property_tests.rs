//! Property-based coverage of the arithmetic and structural invariants.

use bookset_api::availability::build_segments;
use bookset_api::idempotency::IdempotencyKeyManager;
use bookset_api::models::{normalize_duration_minutes, Service};
use bookset_api::pricing;
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

fn service_with(price: i64, duration_minutes: i64) -> Service {
    Service {
        id: "SVC".into(),
        name: "Service".into(),
        price,
        duration_minutes,
        currency: "AUD".into(),
    }
}

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-09-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

proptest! {
    #[test]
    fn deposit_identities_hold_for_any_subtotal(subtotal in 0i64..100_000_000) {
        let quote = pricing::quote(&[service_with(subtotal, 30)]).unwrap();

        prop_assert_eq!(quote.deposit_amount, quote.base_deposit + quote.card_fee);
        prop_assert_eq!(quote.total_amount, quote.subtotal + quote.card_fee);
        prop_assert_eq!(quote.balance_due, quote.subtotal - quote.base_deposit);

        // base deposit is half the subtotal, rounded half-up
        let twice = quote.base_deposit * 2;
        prop_assert!(twice == quote.subtotal || twice == quote.subtotal + 1);

        // fee is within half a cent of exactly 2.2%
        let exact_fee_per_mille = quote.subtotal * 22;
        prop_assert!((quote.card_fee * 1000 - exact_fee_per_mille).abs() <= 500);
    }

    #[test]
    fn quote_sums_service_prices(prices in proptest::collection::vec(0i64..1_000_000, 1..8)) {
        let services: Vec<Service> = prices.iter().map(|&p| service_with(p, 30)).collect();
        let quote = pricing::quote(&services).unwrap();
        prop_assert_eq!(quote.subtotal, prices.iter().sum::<i64>());
    }

    #[test]
    fn segments_are_gapless_and_ordered(durations in proptest::collection::vec(1i64..480, 1..6)) {
        let services: Vec<Service> = durations
            .iter()
            .map(|&d| service_with(1000, d))
            .collect();

        let segments = build_segments(start(), &services, "tm-1");

        prop_assert_eq!(segments.len(), services.len());
        let mut expected_offset = 0i64;
        for (i, segment) in segments.iter().enumerate() {
            // segment N starts at the overall start plus the sum of all
            // earlier durations: no gaps, no overlaps
            prop_assert_eq!(segment.start_at, start() + Duration::minutes(expected_offset));
            expected_offset += durations[i];
        }
    }

    #[test]
    fn duration_normalization_is_idempotent_for_minute_values(minutes in 1i64..9_999) {
        prop_assert_eq!(normalize_duration_minutes(minutes), minutes);
        // the same duration expressed in milliseconds converges to it
        prop_assert_eq!(normalize_duration_minutes(minutes * 60_000), minutes);
    }
}

#[test]
fn a_thousand_keys_are_all_distinct() {
    let manager = IdempotencyKeyManager::new();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..1_000 {
        let keys = manager.issue_saga_keys().unwrap();
        assert!(seen.insert(keys.booking.into_string()));
        assert!(seen.insert(keys.payment.into_string()));
    }
}
