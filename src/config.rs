use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::models::DatasetKind;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub thresholds: RiskThresholds,
    pub supported_extensions: Vec<String>,
    /// Bytes.
    pub max_file_size: u64,
    pub columns: ExpectedColumns,
    pub duplicates: DuplicatePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            supported_extensions: vec![".xlsx".into(), ".xls".into(), ".csv".into()],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            columns: ExpectedColumns::default(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

/// Cut-offs for one tier. A student falls into the tier when attendance or
/// score is strictly below the matching value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TierThreshold {
    pub attendance: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub high_risk: TierThreshold,
    pub at_risk: TierThreshold,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_risk: TierThreshold {
                attendance: 60.0,
                score: 35.0,
            },
            at_risk: TierThreshold {
                attendance: 75.0,
                score: 50.0,
            },
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("high_risk.attendance", self.high_risk.attendance),
            ("high_risk.score", self.high_risk.score),
            ("at_risk.attendance", self.at_risk.attendance),
            ("at_risk.score", self.at_risk.score),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                bail!("threshold {name} must be between 0 and 100, got {value}");
            }
        }
        if self.high_risk.attendance > self.at_risk.attendance {
            bail!(
                "high_risk.attendance ({}) must not exceed at_risk.attendance ({})",
                self.high_risk.attendance,
                self.at_risk.attendance
            );
        }
        if self.high_risk.score > self.at_risk.score {
            bail!(
                "high_risk.score ({}) must not exceed at_risk.score ({})",
                self.high_risk.score,
                self.at_risk.score
            );
        }
        Ok(())
    }
}

/// Expected column names handed to the detector, per dataset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExpectedColumns {
    pub attendance: Vec<String>,
    pub marks: Vec<String>,
    pub fees: Vec<String>,
}

impl Default for ExpectedColumns {
    fn default() -> Self {
        let owned = |kind: DatasetKind| -> Vec<String> {
            kind.default_columns()
                .iter()
                .map(|name| name.to_string())
                .collect()
        };
        Self {
            attendance: owned(DatasetKind::Attendance),
            marks: owned(DatasetKind::Marks),
            fees: owned(DatasetKind::Fees),
        }
    }
}

impl ExpectedColumns {
    pub fn for_kind(&self, kind: DatasetKind) -> &[String] {
        match kind {
            DatasetKind::Attendance => &self.attendance,
            DatasetKind::Marks => &self.marks,
            DatasetKind::Fees => &self.fees,
        }
    }
}

/// Which row wins when one dataset lists the same student twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    KeepFirst,
    KeepLast,
}

impl AppConfig {
    pub fn from_toml(input: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(input).context("invalid config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let input = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml(&input)
                    .with_context(|| format!("failed to load config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.thresholds.validate()?;
        if self.supported_extensions.is_empty() {
            bail!("supported_extensions must list at least one extension");
        }
        if self.max_file_size == 0 {
            bail!("max_file_size must be greater than zero");
        }
        Ok(())
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.supported_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}
