use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::detect::detect_columns;
use crate::ingest;
use crate::merge::merge_datasets;
use crate::models::{AnalysisRun, DatasetKind, RawRow, RiskLevel, StudentRecord};
use crate::risk::process_records;
use crate::standardize::standardize_rows;

/// Raw rows of the three source files.
#[derive(Debug, Clone, Default)]
pub struct DatasetInputs {
    pub attendance: Vec<RawRow>,
    pub marks: Vec<RawRow>,
    pub fees: Vec<RawRow>,
}

impl DatasetInputs {
    pub fn rows(&self, kind: DatasetKind) -> &[RawRow] {
        match kind {
            DatasetKind::Attendance => &self.attendance,
            DatasetKind::Marks => &self.marks,
            DatasetKind::Fees => &self.fees,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub attendance: PathBuf,
    pub marks: PathBuf,
    pub fees: PathBuf,
}

/// Detect columns and standardize one dataset.
pub fn standardize_dataset<S: AsRef<str>>(
    rows: &[RawRow],
    kind: DatasetKind,
    expected: &[S],
) -> Vec<StudentRecord> {
    if rows.is_empty() {
        warn!(dataset = %kind, "dataset has no rows");
    }

    let columns = detect_columns(rows, expected);
    let missing: Vec<&str> = expected
        .iter()
        .map(|field| field.as_ref())
        .filter(|field| columns.get(field).is_none())
        .collect();
    if !rows.is_empty() && !missing.is_empty() {
        warn!(dataset = %kind, missing = ?missing, "expected columns not found");
    }

    standardize_rows(rows, &columns, kind)
}

/// Run detection, standardization, merge and scoring over the three datasets.
pub fn run(inputs: &DatasetInputs, config: &AppConfig) -> AnalysisRun {
    let [attendance, marks, fees] = DatasetKind::ALL.map(|kind| {
        standardize_dataset(inputs.rows(kind), kind, config.columns.for_kind(kind))
    });

    let merged = merge_datasets(&attendance, &marks, &fees, config.duplicates);
    let records = process_records(&merged, &config.thresholds);

    let count = |level: RiskLevel| records.iter().filter(|r| r.risk_level == level).count();
    info!(
        students = records.len(),
        high_risk = count(RiskLevel::HighRisk),
        at_risk = count(RiskLevel::AtRisk),
        safe = count(RiskLevel::Safe),
        "pipeline complete"
    );

    AnalysisRun {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        records,
    }
}

async fn read_in_background(path: &Path, config: &AppConfig) -> anyhow::Result<Vec<RawRow>> {
    let path = path.to_path_buf();
    let config = config.clone();
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || ingest::read_rows(&path, &config))
        .await
        .with_context(|| format!("reader task for {display} failed"))?
}

/// Read the three files concurrently. Fails as a whole if any read fails.
pub async fn load_datasets(paths: &DatasetPaths, config: &AppConfig) -> anyhow::Result<DatasetInputs> {
    let (attendance, marks, fees) = tokio::try_join!(
        read_in_background(&paths.attendance, config),
        read_in_background(&paths.marks, config),
        read_in_background(&paths.fees, config),
    )?;

    Ok(DatasetInputs {
        attendance,
        marks,
        fees,
    })
}

pub async fn analyze_files(paths: &DatasetPaths, config: &AppConfig) -> anyhow::Result<AnalysisRun> {
    let inputs = load_datasets(paths, config).await?;
    Ok(run(&inputs, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_uses_configured_columns() {
        let mut config = AppConfig::default();
        config.columns.fees = vec!["student_id".into(), "fee_pending".into()];

        let inputs = DatasetInputs {
            attendance: vec![RawRow::new()
                .with("Student", "S1")
                .with("Attended", 45.0)
                .with("Total Classes", 50.0)],
            marks: vec![RawRow::new()
                .with("Student", "S1")
                .with("Test1", 60.0)
                .with("Test2", 65.0)
                .with("Test3", 70.0)],
            fees: vec![RawRow::new().with("Student", "S1").with("Fee Pending", "1200")],
        };

        let run = run(&inputs, &config);
        assert_eq!(run.records.len(), 1);
        let record = &run.records[0];
        assert_eq!(record.attendance_pct, 90.0);
        assert_eq!(record.avg_score, 65.0);
        assert_eq!(record.score_trend, 10.0);
        assert_eq!(record.fee_pending, 1200.0);
        assert_eq!(record.risk_level, RiskLevel::Safe);
    }

    #[test]
    fn each_run_gets_its_own_id() {
        let config = AppConfig::default();
        let inputs = DatasetInputs::default();
        let first = run(&inputs, &config);
        let second = run(&inputs, &config);
        assert!(first.records.is_empty());
        assert_ne!(first.run_id, second.run_id);
    }
}
