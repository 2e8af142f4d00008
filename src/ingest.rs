use std::path::Path;

use anyhow::{bail, Context};
use calamine::{open_workbook_auto, Data, Reader};
use tracing::debug;

use crate::config::AppConfig;
use crate::models::{Cell, RawRow};

/// Read the first sheet of a CSV or Excel file into raw rows.
///
/// The first row holds the headers. Rows with no values are dropped.
pub fn read_rows(path: &Path, config: &AppConfig) -> anyhow::Result<Vec<RawRow>> {
    if !config.is_supported(path) {
        bail!(
            "unsupported file type for {} (expected one of: {})",
            path.display(),
            config.supported_extensions.join(", ")
        );
    }

    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    if size > config.max_file_size {
        bail!(
            "{} is {} bytes, larger than the {} byte limit",
            path.display(),
            size,
            config.max_file_size
        );
    }

    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let rows = if is_csv {
        read_csv(path)?
    } else {
        read_workbook(path)?
    };

    debug!(path = %path.display(), rows = rows.len(), "rows read");
    Ok(rows)
}

fn read_csv(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers from {}", path.display()))?
        .clone();

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("{}: malformed record {}", path.display(), index + 2))?;
        let mut row = RawRow::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            if header.is_empty() {
                continue;
            }
            row.push(header, Cell::from(value.trim()));
        }
        if !row.is_blank() {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn data_cell(data: &Data) -> Cell {
    match data {
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) => Cell::Number(*value),
        Data::String(value) => Cell::from(value.trim()),
        Data::Bool(value) => Cell::Text(value.to_string()),
        Data::DateTime(value) => Cell::Number(value.as_f64()),
        Data::DateTimeIso(value) | Data::DurationIso(value) => Cell::from(value.as_str()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

fn header_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::Float(value) if value.fract() == 0.0 => format!("{}", *value as i64),
        other => other.to_string().trim().to_string(),
    }
}

fn read_workbook(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        bail!("{} contains no sheets", path.display());
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet '{}' in {}", sheet_name, path.display()))?;

    let mut lines = range.rows();
    let Some(header_row) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(header_text).collect();

    let mut rows = Vec::new();
    for line in lines {
        let mut row = RawRow::new();
        for (header, data) in headers.iter().zip(line.iter()) {
            if header.is_empty() {
                continue;
            }
            row.push(header, data_cell(data));
        }
        if !row.is_blank() {
            rows.push(row);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excel_cells_keep_their_type() {
        assert_eq!(data_cell(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(data_cell(&Data::Float(2.5)), Cell::Number(2.5));
        assert_eq!(data_cell(&Data::String(" S1 ".into())), Cell::Text("S1".into()));
        assert_eq!(data_cell(&Data::String("   ".into())), Cell::Empty);
        assert_eq!(data_cell(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn numeric_headers_drop_decimals() {
        assert_eq!(header_text(&Data::Float(2024.0)), "2024");
        assert_eq!(header_text(&Data::String(" Test 1 ".into())), "Test 1");
        assert_eq!(header_text(&Data::Empty), "");
    }
}
