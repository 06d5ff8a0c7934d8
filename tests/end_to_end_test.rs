//! End-to-end tests: extraction, persistence, reload, charting, summary

mod common;

use common::{PeriodBuilder, StaticSource, as_of, two_day_periods};
use rust_decimal::Decimal;
use spending::{
    SpendingError,
    aggregation::{DEFAULT_MATERIALITY_THRESHOLD, select_material_groups},
    chart::{CHART_FILE_NAME, ChartRenderer},
    output::render_summary,
    persist::{Persister, RawSnapshotSource, load_table},
    pipeline::{ExtractionPlan, Extractor},
    query::Metric,
    types::RegionScope,
};
use std::sync::Arc;
use tempfile::TempDir;

fn full_source() -> StaticSource {
    StaticSource::new()
        .with_region("us-east-1", two_day_periods(["3.00", "4.00"]))
        .with_region("us-east-2", two_day_periods(["0.50", "0.50"]))
        .with_region("us-west-1", two_day_periods(["0.00", "0.00"]))
        .with_region("us-west-2", two_day_periods(["1.25", "1.75"]))
        .with_region("all", two_day_periods(["4.75", "6.25"]))
}

#[tokio::test]
async fn test_single_region_scenario() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(StaticSource::new().with_region(
        "us-east-1",
        vec![
            PeriodBuilder::new("2024-01-01", "2024-01-02")
                .cost("Amazon EC2", "10.00")
                .build(),
        ],
    ));

    let mut plan = ExtractionPlan::new(as_of());
    plan.regions = vec![RegionScope::Region("us-east-1".to_string())];
    plan.include_total = false;

    let extractor = Extractor::new(source.clone(), Persister::new(dir.path(), as_of()));
    let report = extractor.run(&plan).await.unwrap();

    assert_eq!(source.queried(), vec!["us-east-1"]);
    assert_eq!(report.dataset.len(), 1);
    let obs = &report.dataset.observations()[0];
    assert_eq!(obs.region, "us-east-1");
    assert_eq!(obs.group, "amazon-ec2");
    assert_eq!(obs.metric, "AmortizedCost");
    assert_eq!(obs.amount, Decimal::new(1000, 2));
    assert_eq!(obs.unit, "USD");
    assert_eq!(obs.start_date.as_str(), "2024-01-01");
    assert_eq!(obs.end_date.as_str(), "2024-01-02");

    let material = select_material_groups(&report.dataset, DEFAULT_MATERIALITY_THRESHOLD).unwrap();
    assert!(material.contains("amazon-ec2"));
}

#[tokio::test]
async fn test_fetch_reload_plot_summary() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("cache");
    let img_dir = dir.path().join("img");
    let source = Arc::new(full_source());

    let extractor = Extractor::new(source.clone(), Persister::new(&data_dir, as_of()));
    let report = extractor.run(&ExtractionPlan::new(as_of())).await.unwrap();

    // Default regions first, then the cross-region total.
    assert_eq!(
        source.queried(),
        vec!["us-east-1", "us-east-2", "us-west-1", "us-west-2", "all"]
    );
    assert_eq!(report.dataset.len(), 5 * 5);
    assert!(data_dir.join("spending-2024-01-01.json").exists());
    assert!(data_dir.join("spending-latest.json").exists());
    assert!(data_dir.join("spending-2024-01-01.csv").exists());

    let reloaded = load_table(&report.table.latest).unwrap();
    assert_eq!(reloaded, report.dataset);

    let material = select_material_groups(&reloaded, DEFAULT_MATERIALITY_THRESHOLD).unwrap();
    assert_eq!(material.into_iter().collect::<Vec<_>>(), vec!["amazon-ec2"]);

    let path = ChartRenderer::new(&img_dir, as_of()).render(&reloaded).unwrap();
    assert_eq!(path, img_dir.join("2024-01-01").join(CHART_FILE_NAME));
    let svg = std::fs::read_to_string(&path).unwrap();
    assert!(svg.contains("AWS cost group amazon-ec2 for all regions"));
    assert!(svg.contains("AWS cost group amazon-ec2 by region"));
    assert!(!svg.contains("amazon-simple-storage-service"));

    let summary = render_summary(&reloaded, DEFAULT_MATERIALITY_THRESHOLD, true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&summary).unwrap();
    assert_eq!(value["groups"][0]["group"], "amazon-ec2");
    assert_eq!(value["groups"][0]["total_amount"], "22.00");
}

#[tokio::test]
async fn test_missing_region_aborts_without_artifacts() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("cache");
    let source = StaticSource::new()
        .with_region("us-east-1", two_day_periods(["1.00", "1.00"]))
        .with_region("all", two_day_periods(["1.00", "1.00"]));

    let extractor = Extractor::new(Arc::new(source), Persister::new(&data_dir, as_of()));
    let err = extractor.run(&ExtractionPlan::new(as_of())).await.unwrap_err();

    match err {
        SpendingError::MissingData { region, .. } => assert_eq!(region, "us-east-2"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!data_dir.exists());
}

#[tokio::test]
async fn test_replay_raw_snapshot() {
    let dir = TempDir::new().unwrap();
    let first = Extractor::new(Arc::new(full_source()), Persister::new(dir.path(), as_of()));
    let original = first.run(&ExtractionPlan::new(as_of())).await.unwrap();

    let replay_dir = dir.path().join("replay");
    let snapshot = RawSnapshotSource::load(&original.raw.latest).unwrap();
    let second = Extractor::new(Arc::new(snapshot), Persister::new(&replay_dir, as_of()));
    let replayed = second.run(&ExtractionPlan::new(as_of())).await.unwrap();

    assert_eq!(replayed.dataset, original.dataset);
    assert_eq!(
        std::fs::read_to_string(&replayed.raw.latest).unwrap(),
        std::fs::read_to_string(&original.raw.latest).unwrap()
    );
}

#[tokio::test]
async fn test_mixed_units_block_plot() {
    let dir = TempDir::new().unwrap();
    let source = StaticSource::new().with_region(
        "all",
        vec![
            PeriodBuilder::new("2024-01-01", "2024-01-02")
                .group(
                    &["Amazon EC2"],
                    &[("AmortizedCost", "10.00", "USD"), ("UsageQuantity", "24", "Hrs")],
                )
                .build(),
        ],
    );
    let mut plan = ExtractionPlan::new(as_of());
    plan.regions = vec![RegionScope::All];
    plan.metrics = vec![Metric::AmortizedCost, Metric::UsageQuantity];

    let extractor = Extractor::new(Arc::new(source), Persister::new(dir.path(), as_of()));
    let report = extractor.run(&plan).await.unwrap();
    assert_eq!(report.dataset.len(), 2);

    let img_dir = dir.path().join("img");
    let err = ChartRenderer::new(&img_dir, as_of())
        .render(&report.dataset)
        .unwrap_err();
    assert!(err.to_string().contains("USD"));
    assert!(err.to_string().contains("Hrs"));
    assert!(!img_dir.exists());
}

#[tokio::test]
async fn test_replay_with_other_metric_is_rejected() {
    let dir = TempDir::new().unwrap();
    let first = Extractor::new(Arc::new(full_source()), Persister::new(dir.path(), as_of()));
    let original = first.run(&ExtractionPlan::new(as_of())).await.unwrap();

    let replay_dir = dir.path().join("replay");
    let snapshot = RawSnapshotSource::load(&original.raw.latest).unwrap();
    let mut plan = ExtractionPlan::new(as_of());
    plan.metrics = vec![Metric::UsageQuantity];

    let second = Extractor::new(Arc::new(snapshot), Persister::new(&replay_dir, as_of()));
    match second.run(&plan).await.unwrap_err() {
        SpendingError::MissingData { region, reason } => {
            assert_eq!(region, "us-east-1");
            assert!(reason.contains("AmortizedCost"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!replay_dir.exists());
}
