//! Property-based tests for spending using proptest

mod common;

use common::PeriodBuilder;
use proptest::prelude::*;
use rust_decimal::Decimal;
use spending::{
    aggregation::select_material_groups,
    flatten::{derive_group, flatten},
    persist::{table_from_reader, table_to_csv},
    types::{RawCostData, RawPeriodResult},
};

// Strategies for generating test data

prop_compose! {
    fn arb_amount()(cents in -100_000i64..1_000_000) -> String {
        Decimal::new(cents, 2).to_string()
    }
}

prop_compose! {
    fn arb_key()(key in "[A-Za-z][A-Za-z0-9 ()-]{0,24}") -> String {
        key
    }
}

prop_compose! {
    fn arb_period(day: u32)(
        groups in prop::collection::btree_map(arb_key(), arb_amount(), 0..6)
    ) -> RawPeriodResult {
        let start = format!("2024-01-{day:02}");
        let end = format!("2024-01-{:02}", day + 1);
        groups
            .iter()
            .fold(PeriodBuilder::new(&start, &end), |b, (key, amount)| b.cost(key, amount))
            .build()
    }
}

fn arb_raw() -> impl Strategy<Value = RawCostData> {
    let regions = prop::sample::subsequence(vec!["us-east-1", "us-west-2", "eu-west-1", "all"], 1..=4);
    regions.prop_flat_map(|regions| {
        let per_region = (1u32..=3)
            .prop_flat_map(|days| (1..=days).map(arb_period).collect::<Vec<_>>());
        prop::collection::vec(per_region, regions.len()).prop_map(move |periods| {
            let mut raw = RawCostData::new();
            for (region, periods) in regions.iter().zip(periods) {
                raw.insert(*region, periods).unwrap();
            }
            raw
        })
    })
}

proptest! {
    #[test]
    fn prop_group_is_deterministic(keys in prop::collection::vec(arb_key(), 1..4)) {
        let first = derive_group(&keys);
        let second = derive_group(keys.clone());
        prop_assert_eq!(&first, &second);
        prop_assert!(!first.contains(' '));
        prop_assert_eq!(first.to_lowercase(), first.clone());
    }

    #[test]
    fn prop_flatten_emits_one_row_per_metric(raw in arb_raw()) {
        let expected: usize = raw
            .regions()
            .map(|(_, periods)| periods.iter().map(|p| p.groups.iter().map(|g| g.metrics.len()).sum::<usize>()).sum::<usize>())
            .sum();
        let dataset = flatten(&raw).unwrap();
        prop_assert_eq!(dataset.len(), expected);

        for obs in dataset.iter() {
            prop_assert!(raw.get(&obs.region).is_some());
            prop_assert!(obs.start_date < obs.end_date);
        }
    }

    #[test]
    fn prop_materiality_is_idempotent(raw in arb_raw(), threshold in -50i64..200) {
        let dataset = flatten(&raw).unwrap();
        let threshold = Decimal::new(threshold, 0);
        let first = select_material_groups(&dataset, threshold).unwrap();
        let second = select_material_groups(&dataset, threshold).unwrap();
        prop_assert_eq!(&first, &second);

        // A higher threshold never selects more groups.
        let stricter = select_material_groups(&dataset, threshold + Decimal::ONE).unwrap();
        prop_assert!(stricter.is_subset(&first));
    }

    #[test]
    fn prop_table_round_trip(raw in arb_raw()) {
        let dataset = flatten(&raw).unwrap();
        let csv = table_to_csv(&dataset).unwrap();
        let reloaded = table_from_reader(csv.as_slice()).unwrap();
        let threshold = Decimal::new(5, 0);
        prop_assert_eq!(
            select_material_groups(&reloaded, threshold).unwrap(),
            select_material_groups(&dataset, threshold).unwrap()
        );
        prop_assert_eq!(reloaded, dataset);
    }
}
