//! Property tests for config handling and table export.

use chainlag_core::domain::{MergedRecord, MergedTable};
use chainlag_runner::{export_table_csv, AnalysisConfig, MetricKind};
use chrono::NaiveDate;
use proptest::prelude::*;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 1, 1).unwrap()
}

fn arb_metric() -> impl Strategy<Value = MetricKind> {
    prop_oneof![Just(MetricKind::DailyTx), Just(MetricKind::TotalSupply)]
}

fn arb_config() -> impl Strategy<Value = AnalysisConfig> {
    (0u64..3000, 0u64..400, arb_metric(), 1u32..10, 0u64..1000).prop_map(
        |(offset, span, metric, attempts, interval)| {
            let start = base_date() + chrono::Days::new(offset);
            let mut config =
                AnalysisConfig::for_range(start, start + chrono::Days::new(span), metric);
            config.fetch.max_attempts = attempts;
            config.fetch.min_interval_ms = interval;
            config
        },
    )
}

proptest! {
    #[test]
    fn toml_roundtrip_preserves_config_and_run_id(config in arb_config()) {
        let text = toml::to_string(&config).unwrap();
        let back = AnalysisConfig::from_toml(&text).unwrap();
        prop_assert_eq!(&back, &config);
        prop_assert_eq!(back.run_id(), config.run_id());
    }

    #[test]
    fn csv_has_one_line_per_record(
        rows in prop::collection::vec((1.0..1e9_f64, 1.0..1e5_f64, prop::option::of(-1.0..1.0_f64)), 0..50),
    ) {
        let table = MergedTable {
            records: base_date()
                .iter_days()
                .zip(&rows)
                .map(|(date, &(metric, price, derived_return))| MergedRecord {
                    date,
                    metric,
                    price,
                    derived_return,
                })
                .collect(),
        };

        let csv = export_table_csv(&table).unwrap();
        prop_assert_eq!(csv.lines().count(), rows.len() + 1);
        for (line, row) in csv.lines().skip(1).zip(&rows) {
            prop_assert_eq!(line.ends_with(','), row.2.is_none());
        }
    }
}
