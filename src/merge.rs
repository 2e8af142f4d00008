use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::DuplicatePolicy;
use crate::models::{DatasetKind, MergedStudentRecord, StudentRecord};

/// Index one dataset by student id, honouring the duplicate policy.
fn index_by_id<'a>(
    records: &'a [StudentRecord],
    kind: DatasetKind,
    policy: DuplicatePolicy,
) -> HashMap<&'a str, &'a StudentRecord> {
    let mut index: HashMap<&str, &StudentRecord> = HashMap::with_capacity(records.len());
    let mut duplicates = 0usize;

    for record in records {
        let id = record.student_id.as_str();
        if index.contains_key(id) {
            duplicates += 1;
            if policy == DuplicatePolicy::KeepFirst {
                continue;
            }
        }
        index.insert(id, record);
    }

    if duplicates > 0 {
        warn!(dataset = %kind, duplicates, policy = ?policy, "duplicate student ids");
    }
    index
}

/// Student ids in order of first appearance: attendance, then marks, then fees.
pub fn union_ids<'a>(datasets: [&'a [StudentRecord]; 3]) -> Vec<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ids = Vec::new();
    for records in datasets {
        for record in records {
            if seen.insert(record.student_id.as_str()) {
                ids.push(record.student_id.as_str());
            }
        }
    }
    ids
}

/// Join the three datasets into one record per distinct student id.
pub fn merge_datasets(
    attendance: &[StudentRecord],
    marks: &[StudentRecord],
    fees: &[StudentRecord],
    policy: DuplicatePolicy,
) -> Vec<MergedStudentRecord> {
    let attendance_index = index_by_id(attendance, DatasetKind::Attendance, policy);
    let marks_index = index_by_id(marks, DatasetKind::Marks, policy);
    let fees_index = index_by_id(fees, DatasetKind::Fees, policy);

    let merged: Vec<MergedStudentRecord> = union_ids([attendance, marks, fees])
        .into_iter()
        .map(|id| {
            let mut record = MergedStudentRecord {
                student_id: id.to_string(),
                ..MergedStudentRecord::default()
            };
            if let Some(found) = attendance_index.get(id) {
                record.attended = found.attended;
                record.total_classes = found.total_classes;
            }
            if let Some(found) = marks_index.get(id) {
                record.test1 = found.test1;
                record.test2 = found.test2;
                record.test3 = found.test3;
            }
            if let Some(found) = fees_index.get(id) {
                record.fee_pending = found.fee_pending;
            }
            record
        })
        .collect();

    debug!(
        attendance = attendance.len(),
        marks = marks.len(),
        fees = fees.len(),
        merged = merged.len(),
        "datasets merged"
    );
    merged
}
