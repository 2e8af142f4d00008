use tracing::debug;

use crate::models::{ColumnMap, RawRow};

/// Lower-case and drop everything that is not an ASCII letter or digit.
pub fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Headers in order of first appearance across `rows`.
pub fn collect_headers(rows: &[RawRow]) -> Vec<&str> {
    let mut headers: Vec<&str> = Vec::new();
    for row in rows {
        for header in row.headers() {
            if !headers.contains(&header) {
                headers.push(header);
            }
        }
    }
    headers
}

/// True when `header` is an acceptable source for the canonical `expected` field.
pub fn header_matches(header: &str, expected: &str) -> bool {
    if header.to_lowercase() == expected.to_lowercase() {
        return true;
    }
    let header_norm = normalize_header(header);
    let expected_norm = normalize_header(expected);
    header_norm.contains(&expected_norm) || expected_norm.contains(&header_norm)
}

/// Map each expected field onto the first header that matches it.
///
/// Fields with no matching header are left out of the map. The same header
/// may serve several fields; there is no tie-breaking beyond header order.
pub fn detect_columns<S: AsRef<str>>(rows: &[RawRow], expected: &[S]) -> ColumnMap {
    let mut map = ColumnMap::default();
    if rows.is_empty() {
        return map;
    }

    let headers = collect_headers(rows);
    for field in expected {
        let field = field.as_ref();
        match headers.iter().find(|header| header_matches(header, field)) {
            Some(header) => {
                debug!(field, header = *header, "column detected");
                map.insert(field, header);
            }
            None => debug!(field, "no matching column"),
        }
    }
    map
}
