use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AnalysisRun, CohortSummary, ProcessedStudentRecord, RiskLevel};

pub fn summarize(records: &[ProcessedStudentRecord]) -> CohortSummary {
    let mut summary = CohortSummary {
        total_students: records.len(),
        ..CohortSummary::default()
    };
    if records.is_empty() {
        return summary;
    }

    for record in records {
        match record.risk_level {
            RiskLevel::HighRisk => summary.high_risk += 1,
            RiskLevel::AtRisk => summary.at_risk += 1,
            RiskLevel::Safe => summary.safe += 1,
        }
        summary.avg_attendance += record.attendance_pct;
        summary.avg_score += record.avg_score;
        summary.total_fee_pending += record.fee_pending;
        if record.score_trend > 0.0 {
            summary.improving_students += 1;
        }
    }

    let count = records.len() as f64;
    summary.avg_attendance /= count;
    summary.avg_score /= count;
    summary
}

/// Students in `At Risk` or `High Risk`, in input order.
pub fn at_risk(records: &[ProcessedStudentRecord]) -> Vec<&ProcessedStudentRecord> {
    records
        .iter()
        .filter(|record| record.risk_level.needs_attention())
        .collect()
}

/// Most severe tier first; input order is kept within a tier.
pub fn by_severity(records: &[ProcessedStudentRecord]) -> Vec<&ProcessedStudentRecord> {
    let mut sorted: Vec<&ProcessedStudentRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.risk_level.severity().cmp(&a.risk_level.severity()));
    sorted
}

pub fn alert_subject(date: NaiveDate) -> String {
    format!("At-Risk Students Alert - {date}")
}

pub fn format_trend(trend: f64) -> String {
    if trend >= 0.0 {
        format!("+{trend:.2}")
    } else {
        format!("{trend:.2}")
    }
}

/// Flat export row; numbers are pre-formatted to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub student_id: String,
    pub attendance_pct: String,
    pub avg_score: String,
    pub score_trend: String,
    pub fee_pending: String,
    pub risk_level: String,
}

impl From<&ProcessedStudentRecord> for ExportRow {
    fn from(record: &ProcessedStudentRecord) -> Self {
        Self {
            student_id: record.student_id.clone(),
            attendance_pct: format!("{:.2}", record.attendance_pct),
            avg_score: format!("{:.2}", record.avg_score),
            score_trend: format!("{:.2}", record.score_trend),
            fee_pending: format!("{:.2}", record.fee_pending),
            risk_level: record.risk_level.to_string(),
        }
    }
}

pub fn export_csv<W: std::io::Write>(records: &[&ProcessedStudentRecord], out: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if records.is_empty() {
        writer.write_record([
            "student_id",
            "attendance_pct",
            "avg_score",
            "score_trend",
            "fee_pending",
            "risk_level",
        ])?;
    }
    for record in records {
        writer.serialize(ExportRow::from(*record))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonExport {
    run_id: String,
    generated_at: String,
    students: Vec<ExportRow>,
}

pub fn export_json(run: &AnalysisRun, records: &[&ProcessedStudentRecord]) -> anyhow::Result<String> {
    let export = JsonExport {
        run_id: run.run_id.to_string(),
        generated_at: run.generated_at.to_rfc3339(),
        students: records.iter().map(|record| ExportRow::from(*record)).collect(),
    };
    serde_json::to_string_pretty(&export).context("failed to encode JSON export")
}

pub fn write_csv_file(path: &Path, records: &[&ProcessedStudentRecord]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    export_csv(records, file).with_context(|| format!("failed to write {}", path.display()))
}

fn student_line(record: &ProcessedStudentRecord) -> String {
    format!(
        "| {} | {:.2}% | {:.2} | {} | {:.2} | {} |",
        record.student_id,
        record.attendance_pct,
        record.avg_score,
        format_trend(record.score_trend),
        record.fee_pending,
        record.risk_level
    )
}

pub fn build_report(run: &AnalysisRun) -> String {
    let summary = summarize(&run.records);
    let flagged = at_risk(&run.records);

    let mut output = String::new();
    let _ = writeln!(output, "# Student Risk Report");
    let _ = writeln!(
        output,
        "Run {} generated {}",
        run.run_id,
        run.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Analytics Overview");

    if summary.total_students == 0 {
        let _ = writeln!(output, "No students found in the uploaded data.");
        return output;
    }

    let _ = writeln!(output, "- Total students: {}", summary.total_students);
    let _ = writeln!(output, "- High risk students: {}", summary.high_risk);
    let _ = writeln!(output, "- Average attendance: {:.1}%", summary.avg_attendance);
    let _ = writeln!(output, "- Average score: {:.1}", summary.avg_score);
    let _ = writeln!(output, "- Improving students: {}", summary.improving_students);
    let _ = writeln!(output, "- Total fee pending: {:.2}", summary.total_fee_pending);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution");
    for level in RiskLevel::ALL {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            level,
            summary.count(level),
            summary.share(level)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");
    if flagged.is_empty() {
        let _ = writeln!(output, "No at-risk students found.");
    } else {
        let _ = writeln!(
            output,
            "| Student ID | Attendance % | Avg Score | Score Trend | Fee Pending | Risk Level |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for record in by_severity(&run.records)
            .into_iter()
            .filter(|record| record.risk_level.needs_attention())
        {
            let _ = writeln!(output, "{}", student_line(record));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## All Students");
    let _ = writeln!(
        output,
        "| Student ID | Attendance % | Avg Score | Score Trend | Fee Pending | Risk Level |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for record in &run.records {
        let _ = writeln!(output, "{}", student_line(record));
    }

    output
}
