use tracing::warn;

use crate::models::{Cell, ColumnMap, DatasetKind, RawRow, StudentRecord};

/// Parse like a spreadsheet formula would: surrounding whitespace is
/// ignored and the longest numeric prefix is used ("85%" -> 85).
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(value) = text.parse::<f64>() {
        return value.is_finite().then_some(value);
    }

    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    // Optional exponent, only when it is complete.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn cell_number(cell: Option<&Cell>) -> Option<f64> {
    match cell? {
        Cell::Number(value) => value.is_finite().then_some(*value),
        Cell::Text(text) => parse_number(text),
        Cell::Empty => None,
    }
}

/// Render a cell as an identifier. Integral numbers drop the fractional part.
pub fn cell_text(cell: Option<&Cell>) -> String {
    match cell {
        Some(Cell::Text(text)) => text.trim().to_string(),
        Some(Cell::Number(value)) if value.is_finite() => {
            if value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", *value as i64)
            } else {
                value.to_string()
            }
        }
        _ => String::new(),
    }
}

/// Pick the header holding the student identifier for this row.
///
/// Mapped column first, then any header mentioning "student" or "id",
/// then the row's first column.
pub fn student_id_header<'a>(row: &'a RawRow, columns: &'a ColumnMap) -> Option<&'a str> {
    if let Some(header) = columns.get("student_id") {
        return Some(header);
    }
    row.headers()
        .find(|header| {
            let lower = header.to_lowercase();
            lower.contains("student") || lower.contains("id")
        })
        .or_else(|| row.first().map(|(header, _)| header))
}

pub fn resolve_student_id(row: &RawRow, columns: &ColumnMap) -> String {
    let cell = student_id_header(row, columns).and_then(|header| row.get(header));
    cell_text(cell)
}

fn mapped_number(row: &RawRow, columns: &ColumnMap, field: &str) -> Option<f64> {
    cell_number(columns.get(field).and_then(|header| row.get(header)))
}

pub fn standardize_row(row: &RawRow, columns: &ColumnMap, kind: DatasetKind) -> StudentRecord {
    let mut record = StudentRecord::new(&resolve_student_id(row, columns));
    match kind {
        DatasetKind::Attendance => {
            record.attended = mapped_number(row, columns, "attended").unwrap_or(0.0);
            record.total_classes = mapped_number(row, columns, "total_classes").unwrap_or(0.0);
        }
        DatasetKind::Marks => {
            record.test1 = mapped_number(row, columns, "test1");
            record.test2 = mapped_number(row, columns, "test2");
            record.test3 = mapped_number(row, columns, "test3");
        }
        DatasetKind::Fees => {
            record.fee_pending = mapped_number(row, columns, "fee_pending").unwrap_or(0.0);
        }
    }
    record
}

/// One record per row, in input order.
pub fn standardize_rows(rows: &[RawRow], columns: &ColumnMap, kind: DatasetKind) -> Vec<StudentRecord> {
    let records: Vec<StudentRecord> = rows
        .iter()
        .map(|row| standardize_row(row, columns, kind))
        .collect();

    let blank_ids = records.iter().filter(|r| r.student_id.is_empty()).count();
    if blank_ids > 0 {
        warn!(dataset = %kind, rows = blank_ids, "rows without a usable student id");
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_columns;

    #[test]
    fn parse_number_accepts_numeric_prefixes() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("85%"), Some(85.0));
        assert_eq!(parse_number("-3.5kg"), Some(-3.5));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("1e2"), Some(100.0));
        assert_eq!(parse_number("7e"), Some(7.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn numeric_ids_render_without_decimals() {
        assert_eq!(cell_text(Some(&Cell::Number(101.0))), "101");
        assert_eq!(cell_text(Some(&Cell::Number(1.5))), "1.5");
        assert_eq!(cell_text(Some(&Cell::Text("  S1 ".into()))), "S1");
        assert_eq!(cell_text(Some(&Cell::Empty)), "");
        assert_eq!(cell_text(None), "");
    }

    #[test]
    fn attendance_defaults_unparseable_to_zero() {
        let rows = vec![RawRow::new()
            .with("Student ID", "S1")
            .with("Attended", "n/a")
            .with("Total Classes", 40.0)];
        let columns = detect_columns(&rows, DatasetKind::Attendance.default_columns());
        let records = standardize_rows(&rows, &columns, DatasetKind::Attendance);

        assert_eq!(records[0].student_id, "S1");
        assert_eq!(records[0].attended, 0.0);
        assert_eq!(records[0].total_classes, 40.0);
    }

    #[test]
    fn marks_keep_missing_scores_absent() {
        let rows = vec![RawRow::new()
            .with("student_id", "S4")
            .with("test1", 70.0)
            .with("test2", "")
            .with("test3", "absent")];
        let columns = detect_columns(&rows, DatasetKind::Marks.default_columns());
        let record = standardize_row(&rows[0], &columns, DatasetKind::Marks);

        assert_eq!(record.test1, Some(70.0));
        assert_eq!(record.test2, None);
        assert_eq!(record.test3, None);
    }

    #[test]
    fn zero_score_is_present() {
        let rows = vec![RawRow::new().with("student_id", "S9").with("test1", 0.0)];
        let columns = detect_columns(&rows, DatasetKind::Marks.default_columns());
        let record = standardize_row(&rows[0], &columns, DatasetKind::Marks);
        assert_eq!(record.test1, Some(0.0));
    }

    #[test]
    fn unmapped_fee_column_defaults_to_zero() {
        let row = RawRow::new().with("student_id", "S1");
        let columns = detect_columns(std::slice::from_ref(&row), &["student_id", "fee_pending"]);
        let record = standardize_row(&row, &columns, DatasetKind::Fees);
        assert_eq!(record.fee_pending, 0.0);
    }

    #[test]
    fn student_id_falls_back_to_id_like_header() {
        let row = RawRow::new().with("Name", "Avery").with("Roll Id", "R7");
        let record = standardize_row(&row, &ColumnMap::default(), DatasetKind::Fees);
        assert_eq!(record.student_id, "R7");
    }

    #[test]
    fn student_id_falls_back_to_first_column() {
        let row = RawRow::new().with("Roll", 12.0).with("Dues", 300.0);
        let record = standardize_row(&row, &ColumnMap::default(), DatasetKind::Fees);
        assert_eq!(record.student_id, "12");
    }

    #[test]
    fn empty_row_gives_empty_id() {
        let record = standardize_row(&RawRow::new(), &ColumnMap::default(), DatasetKind::Marks);
        assert_eq!(record.student_id, "");
        assert_eq!(record.test1, None);
    }
}
