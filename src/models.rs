use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single spreadsheet cell as handed over by a file reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// One row of a source file, keyed by header in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, Cell)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, header: &str, cell: impl Into<Cell>) -> Self {
        self.push(header, cell.into());
        self
    }

    /// Later duplicates of a header are ignored, the first cell wins.
    pub fn push(&mut self, header: &str, cell: Cell) {
        if self.get(header).is_none() {
            self.cells.push((header.to_string(), cell));
        }
    }

    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, cell)| cell)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn first(&self) -> Option<(&str, &Cell)> {
        self.cells.first().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, cell)| *cell == Cell::Empty)
    }
}

/// Canonical field name -> actual header found in a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<String, String>,
}

impl ColumnMap {
    pub fn insert(&mut self, field: &str, header: &str) {
        self.columns.insert(field.to_string(), header.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.columns.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Attendance,
    Marks,
    Fees,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [Self::Attendance, Self::Marks, Self::Fees];

    pub fn default_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Attendance => &["student_id", "attended", "total_classes"],
            Self::Marks => &["student_id", "test1", "test2", "test3"],
            Self::Fees => &["student_id", "fee_pending"],
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attendance => write!(f, "attendance"),
            Self::Marks => write!(f, "marks"),
            Self::Fees => write!(f, "fees"),
        }
    }
}

/// Standardized row of one dataset. Only the fields of its kind are filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRecord {
    pub student_id: String,
    pub attended: f64,
    pub total_classes: f64,
    pub test1: Option<f64>,
    pub test2: Option<f64>,
    pub test3: Option<f64>,
    pub fee_pending: f64,
}

impl StudentRecord {
    pub fn new(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedStudentRecord {
    pub student_id: String,
    pub attended: f64,
    pub total_classes: f64,
    pub test1: Option<f64>,
    pub test2: Option<f64>,
    pub test3: Option<f64>,
    pub fee_pending: f64,
}

impl MergedStudentRecord {
    pub fn scores(&self) -> [Option<f64>; 3] {
        [self.test1, self.test2, self.test3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "High Risk")]
    HighRisk,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Safe")]
    Safe,
}

impl RiskLevel {
    /// Most severe first.
    pub const ALL: [RiskLevel; 3] = [Self::HighRisk, Self::AtRisk, Self::Safe];

    pub fn severity(&self) -> u8 {
        match self {
            Self::HighRisk => 2,
            Self::AtRisk => 1,
            Self::Safe => 0,
        }
    }

    pub fn needs_attention(&self) -> bool {
        !matches!(self, Self::Safe)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighRisk => write!(f, "High Risk"),
            Self::AtRisk => write!(f, "At Risk"),
            Self::Safe => write!(f, "Safe"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "highrisk" | "high" => Ok(Self::HighRisk),
            "atrisk" => Ok(Self::AtRisk),
            "safe" => Ok(Self::Safe),
            _ => Err(format!("unknown risk level '{value}'")),
        }
    }
}

/// Final per-student output. Test scores are the imputed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedStudentRecord {
    pub student_id: String,
    pub attended: f64,
    pub total_classes: f64,
    pub test1: f64,
    pub test2: f64,
    pub test3: f64,
    pub fee_pending: f64,
    pub attendance_pct: f64,
    pub avg_score: f64,
    pub score_trend: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<ProcessedStudentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortSummary {
    pub total_students: usize,
    pub high_risk: usize,
    pub at_risk: usize,
    pub safe: usize,
    pub avg_attendance: f64,
    pub avg_score: f64,
    pub total_fee_pending: f64,
    pub improving_students: usize,
}

impl CohortSummary {
    pub fn count(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::HighRisk => self.high_risk,
            RiskLevel::AtRisk => self.at_risk,
            RiskLevel::Safe => self.safe,
        }
    }

    pub fn share(&self, level: RiskLevel) -> f64 {
        if self.total_students == 0 {
            0.0
        } else {
            self.count(level) as f64 / self.total_students as f64 * 100.0
        }
    }
}
