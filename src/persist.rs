//! Persistence of raw and tabular artifacts
//!
//! Every save writes two files into the data directory: a date-stamped one
//! (`spending-<YYYY-MM-DD>.<ext>`) and a stable alias
//! (`spending-latest.<ext>`). Each file is written to a temporary sibling and
//! renamed into place, so a reader never sees a half-written artifact. Two
//! runs on the same day still race on both names; the last writer wins.
//!
//! The tabular CSV carries a leading unnamed index column followed by
//! `region,group,metric,amount,unit,start_date,end_date`.

use crate::error::{Result, SpendingError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use spending_core::flatten::parse_amount;
use spending_core::query::CostQuery;
use spending_core::source::CostSource;
use spending_core::types::{Dataset, DatasetBuilder, Observation, PeriodDate, RawCostData, RawPeriodResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// File name prefix shared by every artifact
pub const ARTIFACT_PREFIX: &str = "spending";

/// Suffix of the stable alias
pub const LATEST_SUFFIX: &str = "latest";

/// Column names of the tabular CSV, after the index column
pub const TABLE_COLUMNS: [&str; 7] = [
    "region",
    "group",
    "metric",
    "amount",
    "unit",
    "start_date",
    "end_date",
];

/// Locations written by one save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    /// `spending-<date>.<ext>`
    pub dated: PathBuf,
    /// `spending-latest.<ext>`
    pub latest: PathBuf,
}

/// Writes run artifacts under a data directory
#[derive(Debug, Clone)]
pub struct Persister {
    data_dir: PathBuf,
    as_of: NaiveDate,
}

impl Persister {
    /// Create a persister stamping files with `as_of`
    pub fn new(data_dir: impl Into<PathBuf>, as_of: NaiveDate) -> Self {
        Self {
            data_dir: data_dir.into(),
            as_of,
        }
    }

    /// Directory artifacts are written to
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the stable alias for an extension
    pub fn latest_path(data_dir: &Path, ext: &str) -> PathBuf {
        data_dir.join(format!("{ARTIFACT_PREFIX}-{LATEST_SUFFIX}.{ext}"))
    }

    /// Both target paths for an extension
    pub fn artifact_paths(&self, ext: &str) -> SavedArtifact {
        SavedArtifact {
            dated: self
                .data_dir
                .join(format!("{ARTIFACT_PREFIX}-{}.{ext}", self.as_of.format("%Y-%m-%d"))),
            latest: Self::latest_path(&self.data_dir, ext),
        }
    }

    /// Save the raw nested results as JSON
    pub fn save_raw(&self, data: &RawCostData) -> Result<SavedArtifact> {
        let json = data.to_json_string()?;
        self.save("raw", "json", json.as_bytes())
    }

    /// Save the flattened dataset as CSV
    pub fn save_table(&self, dataset: &Dataset) -> Result<SavedArtifact> {
        let csv = table_to_csv(dataset)?;
        self.save("formatted", "csv", &csv)
    }

    fn save(&self, result_type: &str, ext: &str, contents: &[u8]) -> Result<SavedArtifact> {
        std::fs::create_dir_all(&self.data_dir)?;
        let paths = self.artifact_paths(ext);
        for path in [&paths.dated, &paths.latest] {
            info!("Saving {} results to {}", result_type, path.display());
            write_atomic(path, contents)?;
        }
        Ok(paths)
    }
}

/// Write `contents` to `path` through a temporary file in the same directory
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| SpendingError::Io(e.error))?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Render the dataset as CSV with a leading index column
pub fn table_to_csv(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    let mut header = vec![""];
    header.extend(TABLE_COLUMNS);
    writer.write_record(&header)?;

    for (idx, obs) in dataset.iter().enumerate() {
        writer.write_record([
            idx.to_string(),
            obs.region.clone(),
            obs.group.clone(),
            obs.metric.clone(),
            obs.amount.to_string(),
            obs.unit.clone(),
            obs.start_date.to_string(),
            obs.end_date.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| SpendingError::Io(e.into_error()))
}

/// One CSV row before validation; the index column is ignored
#[derive(Debug, Deserialize)]
struct TableRow {
    region: String,
    group: String,
    metric: String,
    amount: String,
    unit: String,
    start_date: String,
    end_date: String,
}

/// Parse a tabular CSV produced by [`table_to_csv`]
pub fn table_from_reader<R: std::io::Read>(reader: R) -> Result<Dataset> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut builder = DatasetBuilder::new();

    for row in csv_reader.deserialize() {
        let row: TableRow = row?;
        let amount = parse_amount(&row.amount).ok_or_else(|| SpendingError::MalformedAmount {
            region: row.region.clone(),
            group: row.group.clone(),
            metric: row.metric.clone(),
            amount: row.amount.clone(),
        })?;
        builder.push(Observation {
            start_date: PeriodDate::parse(&row.start_date)?,
            end_date: PeriodDate::parse(&row.end_date)?,
            region: row.region,
            group: row.group,
            metric: row.metric,
            amount,
            unit: row.unit,
        });
    }

    Ok(builder.finish())
}

/// Load a tabular CSV from disk
///
/// A missing file is reported as [`SpendingError::MissingInput`].
pub fn load_table(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        return Err(SpendingError::MissingInput(path.to_path_buf()));
    }
    let dataset = table_from_reader(std::fs::File::open(path)?)?;
    info!("Loaded {} observations from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Load a raw JSON snapshot from disk
pub fn load_raw(path: &Path) -> Result<RawCostData> {
    if !path.exists() {
        return Err(SpendingError::MissingInput(path.to_path_buf()));
    }
    RawCostData::from_json_str(&std::fs::read_to_string(path)?)
}

/// Cost source replaying a saved raw snapshot instead of calling the API
///
/// Useful to re-run flattening after a change without spending API calls.
/// The region has to be present in the snapshot. Metrics are checked by the
/// [`Extractor`](crate::pipeline::Extractor) like any other response; the
/// dimension and dates are taken as recorded.
#[derive(Debug, Clone)]
pub struct RawSnapshotSource {
    path: PathBuf,
    data: RawCostData,
}

impl RawSnapshotSource {
    /// Load the snapshot at `path`
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = load_raw(&path)?;
        debug!("Loaded raw snapshot with {} regions from {}", data.len(), path.display());
        Ok(Self { path, data })
    }

    /// Regions present in the snapshot, in file order
    pub fn regions(&self) -> Vec<&str> {
        self.data.regions().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl CostSource for RawSnapshotSource {
    fn name(&self) -> &str {
        "raw-snapshot"
    }

    async fn fetch(&self, query: &CostQuery) -> Result<Vec<RawPeriodResult>> {
        let region = query.region.as_str();
        info!("Replaying {} from {}", region, self.path.display());
        self.data
            .get(region)
            .map(<[RawPeriodResult]>::to_vec)
            .ok_or_else(|| {
                SpendingError::missing_data(
                    region,
                    format!("not present in snapshot {}", self.path.display()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use spending_core::flatten::flatten;
    use spending_core::query::{DateRange, Dimension, Granularity, Metric};
    use spending_core::types::RegionScope;
    use tempfile::TempDir;

    const RAW: &str = r#"{
        "us-east-1": [{
            "TimePeriod": {"Start": "2024-01-01", "End": "2024-01-02"},
            "Groups": [
                {"Keys": ["Amazon EC2"], "Metrics": {"AmortizedCost": {"Amount": "10.00", "Unit": "USD"}}},
                {"Keys": ["Tax"], "Metrics": {"AmortizedCost": {"Amount": "-1.25", "Unit": "USD"}}}
            ]
        }],
        "all": [{
            "TimePeriod": {"Start": "2024-01-01", "End": "2024-01-02"},
            "Groups": [
                {"Keys": ["Amazon EC2"], "Metrics": {"AmortizedCost": {"Amount": "12.00", "Unit": "USD"}}}
            ]
        }]
    }"#;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_artifact_paths() {
        let persister = Persister::new("cache", as_of());
        let paths = persister.artifact_paths("csv");
        assert_eq!(paths.dated, PathBuf::from("cache/spending-2024-01-01.csv"));
        assert_eq!(paths.latest, PathBuf::from("cache/spending-latest.csv"));
    }

    #[test]
    fn test_table_csv_layout() {
        let dataset = flatten(&RawCostData::from_json_str(RAW).unwrap()).unwrap();
        let csv = String::from_utf8(table_to_csv(&dataset).unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], ",region,group,metric,amount,unit,start_date,end_date");
        assert_eq!(
            lines[1],
            "0,us-east-1,amazon-ec2,AmortizedCost,10.00,USD,2024-01-01,2024-01-02"
        );
        assert_eq!(lines[2], "1,us-east-1,tax,AmortizedCost,-1.25,USD,2024-01-01,2024-01-02");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_table_round_trip() {
        let dataset = flatten(&RawCostData::from_json_str(RAW).unwrap()).unwrap();
        let csv = table_to_csv(&dataset).unwrap();
        let reloaded = table_from_reader(csv.as_slice()).unwrap();
        assert_eq!(reloaded, dataset);
    }

    #[test]
    fn test_table_reader_rejects_bad_amount() {
        let csv = ",region,group,metric,amount,unit,start_date,end_date\n\
                   0,us-east-1,ec2,AmortizedCost,abc,USD,2024-01-01,2024-01-02\n";
        assert!(matches!(
            table_from_reader(csv.as_bytes()),
            Err(SpendingError::MalformedAmount { .. })
        ));
    }

    #[test]
    fn test_table_reader_accepts_float_amounts() {
        // Tables written by other tools may render amounts as floats.
        let csv = ",region,group,metric,amount,unit,start_date,end_date\n\
                   0,all,ec2,AmortizedCost,1e-05,USD,2024-01-01,2024-01-02\n";
        let dataset = table_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.observations()[0].amount, Decimal::new(1, 5));
    }

    #[test]
    fn test_save_writes_dated_and_latest() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("nested/cache");
        let persister = Persister::new(&data_dir, as_of());

        let raw = RawCostData::from_json_str(RAW).unwrap();
        let saved = persister.save_raw(&raw).unwrap();
        assert!(saved.dated.exists());
        assert!(saved.latest.exists());
        assert_eq!(
            std::fs::read_to_string(&saved.dated).unwrap(),
            std::fs::read_to_string(&saved.latest).unwrap()
        );
        assert_eq!(load_raw(&saved.latest).unwrap(), raw);

        let dataset = flatten(&raw).unwrap();
        let saved = persister.save_table(&dataset).unwrap();
        assert_eq!(load_table(&saved.latest).unwrap(), dataset);

        // No temporary files are left behind.
        let names: Vec<_> = std::fs::read_dir(&data_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_latest_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let first = Persister::new(dir.path(), as_of());
        let second = Persister::new(dir.path(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        let raw = RawCostData::from_json_str(RAW).unwrap();
        first.save_raw(&raw).unwrap();
        let empty = RawCostData::new();
        let saved = second.save_raw(&empty).unwrap();

        assert_eq!(load_raw(&saved.latest).unwrap(), empty);
        assert_eq!(load_raw(&dir.path().join("spending-2024-01-01.json")).unwrap(), raw);
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spending-latest.csv");
        assert!(matches!(load_table(&path), Err(SpendingError::MissingInput(p)) if p == path));
    }

    #[tokio::test]
    async fn test_snapshot_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.json");
        std::fs::write(&path, RAW).unwrap();
        let source = RawSnapshotSource::load(&path).unwrap();
        assert_eq!(source.regions(), vec!["us-east-1", "all"]);

        let period = DateRange::lookback(as_of(), 1).unwrap();
        let query = |region: &str| {
            CostQuery::new(
                region.parse::<RegionScope>().unwrap(),
                Dimension::Service,
                vec![Metric::AmortizedCost],
                Granularity::Daily,
                period,
            )
            .unwrap()
        };

        assert_eq!(source.fetch(&query("us-east-1")).await.unwrap().len(), 1);
        match source.fetch(&query("eu-west-1")).await.unwrap_err() {
            SpendingError::MissingData { region, .. } => assert_eq!(region, "eu-west-1"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
