//! Table invariants and CSV round-trip through the public API

use chrono::Duration;
use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::test_data::{date, price, table};
use sp500_updater::models::{Record, Table};
use sp500_updater::storage::codec;

#[test]
fn test_round_trip_keeps_dates_and_prices() {
    let original = table(&[
        ("2024-07-22", "5555.74"),
        ("2024-07-23", "5563.1"),
        ("2024-07-24", "5505"),
        ("2024-07-25", "0"),
    ]);

    let bytes = codec::encode(&original).unwrap();
    let decoded = codec::decode(&bytes).unwrap();

    assert_eq!(decoded, original);
    assert_eq!(codec::encode(&decoded).unwrap(), bytes);
}

#[test]
fn test_prices_are_rounded_to_cents() {
    let t = table(&[("2024-07-22", "5555.745"), ("2024-07-23", "5563.114")]);
    assert_eq!(t.get(date("2024-07-22")), Some(price("5555.75")));
    assert_eq!(t.get(date("2024-07-23")), Some(price("5563.11")));
}

#[test]
fn test_any_insertion_order_gives_sorted_unique_table() {
    let start = date("2024-01-01");
    // deterministic shuffle with repeated dates
    let rows: Vec<Record> = (0..60)
        .map(|i| {
            let day = start + Duration::days((i * 7) % 20);
            Record::new(day, price("100") + rust_decimal::Decimal::from(i))
        })
        .collect();

    let t = Table::from_records(rows.clone());
    let dates: Vec<_> = t.records().map(|r| r.date).collect();

    assert_eq!(dates.len(), 20);
    assert!(dates.windows(2).all(|w| w[0] < w[1]));

    // the last row written for a date wins
    for day in &dates {
        let last = rows.iter().rev().find(|r| r.date == *day).unwrap();
        assert_eq!(t.get(*day), Some(last.opening_price));
    }
}

#[test]
fn test_latest_is_most_recent_date() {
    let t = table(&[("2024-07-23", "5563.12"), ("2024-07-19", "5543.34"), ("2024-07-22", "5555.74")]);
    assert_eq!(t.latest(), Some(Record::new(date("2024-07-23"), price("5563.12"))));
    assert_eq!(Table::new().latest(), None);
}
