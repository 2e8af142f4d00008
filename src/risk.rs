use crate::config::RiskThresholds;
use crate::models::{MergedStudentRecord, ProcessedStudentRecord, RiskLevel};

/// Round half away from zero to two decimals. Never returns negative zero.
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Pooled mean of every present score in the batch, 0 when there are none.
pub fn global_average(records: &[MergedStudentRecord]) -> f64 {
    let pooled: Vec<f64> = records
        .iter()
        .flat_map(|record| record.scores())
        .flatten()
        .collect();
    mean(&pooled).unwrap_or(0.0)
}

/// Fill absent scores with the student's own mean, else the batch mean.
pub fn impute_scores(scores: [Option<f64>; 3], global_average: f64) -> [f64; 3] {
    let present: Vec<f64> = scores.iter().flatten().copied().collect();
    let fallback = mean(&present).unwrap_or(global_average);
    scores.map(|score| score.unwrap_or(fallback))
}

pub fn attendance_pct(attended: f64, total_classes: f64) -> f64 {
    if total_classes > 0.0 {
        attended / total_classes * 100.0
    } else {
        0.0
    }
}

/// First matching rule wins, most severe tier first.
pub fn classify(attendance_pct: f64, avg_score: f64, thresholds: &RiskThresholds) -> RiskLevel {
    if attendance_pct < thresholds.high_risk.attendance || avg_score < thresholds.high_risk.score {
        RiskLevel::HighRisk
    } else if attendance_pct < thresholds.at_risk.attendance
        || avg_score < thresholds.at_risk.score
    {
        RiskLevel::AtRisk
    } else {
        RiskLevel::Safe
    }
}

pub fn process_record(
    record: &MergedStudentRecord,
    global_average: f64,
    thresholds: &RiskThresholds,
) -> ProcessedStudentRecord {
    let [test1, test2, test3] = impute_scores(record.scores(), global_average);

    let raw_attendance = attendance_pct(record.attended, record.total_classes);
    let raw_average = (test1 + test2 + test3) / 3.0;
    // Tier from unrounded values; rounding is for reporting only.
    let risk_level = classify(raw_attendance, raw_average, thresholds);

    ProcessedStudentRecord {
        student_id: record.student_id.clone(),
        attended: record.attended,
        total_classes: record.total_classes,
        test1,
        test2,
        test3,
        fee_pending: record.fee_pending,
        attendance_pct: round2(raw_attendance),
        avg_score: round2(raw_average),
        score_trend: round2(test3 - test1),
        risk_level,
    }
}

/// Derive metrics and a risk tier for every merged record, in input order.
pub fn process_records(
    records: &[MergedStudentRecord],
    thresholds: &RiskThresholds,
) -> Vec<ProcessedStudentRecord> {
    let global = global_average(records);
    records
        .iter()
        .map(|record| process_record(record, global, thresholds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(
        id: &str,
        attended: f64,
        total: f64,
        scores: [Option<f64>; 3],
    ) -> MergedStudentRecord {
        MergedStudentRecord {
            student_id: id.to_string(),
            attended,
            total_classes: total,
            test1: scores[0],
            test2: scores[1],
            test3: scores[2],
            fee_pending: 0.0,
        }
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(-20.0), -20.0);
        assert!(round2(-0.001).is_sign_positive());
    }

    #[test]
    fn tiers_follow_expected_thresholds() {
        let thresholds = RiskThresholds::default();
        assert_eq!(classify(90.0, 70.0, &thresholds), RiskLevel::Safe);
        assert_eq!(classify(74.99, 70.0, &thresholds), RiskLevel::AtRisk);
        assert_eq!(classify(90.0, 49.99, &thresholds), RiskLevel::AtRisk);
        assert_eq!(classify(59.99, 90.0, &thresholds), RiskLevel::HighRisk);
        assert_eq!(classify(90.0, 34.99, &thresholds), RiskLevel::HighRisk);
        assert_eq!(classify(75.0, 50.0, &thresholds), RiskLevel::Safe);
        assert_eq!(classify(60.0, 35.0, &thresholds), RiskLevel::AtRisk);
    }

    #[test]
    fn lowering_attendance_never_lowers_severity() {
        let thresholds = RiskThresholds::default();
        for score in [20.0, 40.0, 60.0, 95.0] {
            let mut previous = 0u8;
            for attendance in (0..=100).rev() {
                let severity = classify(attendance as f64, score, &thresholds).severity();
                assert!(severity >= previous, "attendance {attendance} score {score}");
                previous = severity;
            }
        }
    }

    #[test]
    fn custom_thresholds_are_honoured() {
        let mut thresholds = RiskThresholds::default();
        thresholds.at_risk.attendance = 95.0;
        assert_eq!(classify(90.0, 70.0, &thresholds), RiskLevel::AtRisk);
    }

    #[test]
    fn zero_classes_means_zero_attendance() {
        assert_eq!(attendance_pct(10.0, 0.0), 0.0);
        assert_eq!(attendance_pct(45.0, 60.0), 75.0);
    }

    #[test]
    fn complete_scores_are_not_imputed() {
        let scores = impute_scores([Some(80.0), Some(70.0), Some(60.0)], 10.0);
        assert_eq!(scores, [80.0, 70.0, 60.0]);
    }

    #[test]
    fn missing_score_uses_student_average() {
        let scores = impute_scores([Some(70.0), None, Some(50.0)], 10.0);
        assert_eq!(scores, [70.0, 60.0, 50.0]);
    }

    #[test]
    fn student_without_scores_uses_global_average() {
        let records = vec![
            merged("S1", 9.0, 10.0, [Some(90.0), Some(80.0), Some(70.0)]),
            merged("S2", 9.0, 10.0, [Some(40.0), None, None]),
            merged("S3", 9.0, 10.0, [None, None, None]),
        ];
        assert_eq!(global_average(&records), 70.0);

        let processed = process_records(&records, &RiskThresholds::default());
        assert_eq!(processed[1].test2, 40.0);
        assert_eq!(processed[2].test1, 70.0);
        assert_eq!(processed[2].avg_score, 70.0);
        assert_eq!(processed[2].score_trend, 0.0);
    }

    #[test]
    fn batch_without_scores_defaults_to_zero() {
        let records = vec![merged("S1", 10.0, 10.0, [None, None, None])];
        let processed = process_records(&records, &RiskThresholds::default());
        assert_eq!(processed[0].avg_score, 0.0);
        assert_eq!(processed[0].risk_level, RiskLevel::HighRisk);
    }

    #[test]
    fn tier_is_decided_before_rounding() {
        let thresholds = RiskThresholds::default();

        let attendance = merged("S1", 14999.0, 25000.0, [Some(90.0), Some(90.0), Some(90.0)]);
        let processed = process_record(&attendance, 0.0, &thresholds);
        assert_eq!(processed.attendance_pct, 60.0);
        assert_eq!(processed.risk_level, RiskLevel::HighRisk);

        let scores = merged("S2", 100.0, 100.0, [Some(35.0), Some(35.0), Some(34.99)]);
        let processed = process_record(&scores, 0.0, &thresholds);
        assert_eq!(processed.avg_score, 35.0);
        assert_eq!(processed.risk_level, RiskLevel::HighRisk);
    }

    #[test]
    fn derived_metrics_are_rounded() {
        let records = vec![merged("S1", 2.0, 3.0, [Some(70.0), Some(71.0), Some(71.0)])];
        let processed = process_records(&records, &RiskThresholds::default());
        assert_eq!(processed[0].attendance_pct, 66.67);
        assert_eq!(processed[0].avg_score, 70.67);
        assert_eq!(processed[0].score_trend, 1.0);
        assert_eq!(processed[0].risk_level, RiskLevel::AtRisk);
    }
}
