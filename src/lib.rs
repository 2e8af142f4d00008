//! Reconciles attendance, marks and fee spreadsheets into one record per
//! student and sorts every student into a risk tier.

pub mod config;
pub mod detect;
pub mod ingest;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod standardize;

pub use config::{AppConfig, RiskThresholds};
pub use models::{AnalysisRun, ProcessedStudentRecord, RiskLevel};
pub use pipeline::{analyze_files, run, DatasetInputs, DatasetPaths};
