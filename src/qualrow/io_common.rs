// Primitives shared by the table writers.

use std::collections::HashSet;
use std::path::Path;

use crate::qualrow::*;

pub fn simplify_file_name(path: &str) -> QualrowResult<String> {
    match Path::new(path).file_name().and_then(|n| n.to_str()) {
        Some(n) => Ok(n.to_string()),
        None => whatever!("Cannot find a file name in {:?}", path),
    }
}

/// The text written in a cell. Lists are joined with `" • "` and mappings
/// are written as JSON.
pub fn coerce_cell_value(v: &JSValue) -> String {
    match v {
        JSValue::Null => "".to_string(),
        JSValue::String(s) => s.clone(),
        JSValue::Array(l) => l
            .iter()
            .map(coerce_cell_value)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<String>>()
            .join(" • "),
        JSValue::Object(_) => v.to_string(),
        other => other.to_string(),
    }
}

/// What happened to the keys of a row once matched against the columns of a table.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SinkReport {
    /// Keys of the row without a column of the same name.
    pub ignored_keys: Vec<String>,
    /// Columns of the table that received no value.
    pub blank_columns: Vec<String>,
}

/// Lays out a row along the headers of a table. Headers are matched on their
/// exact (trimmed) text.
pub fn build_row(headers: &[String], row: &JSValue) -> (Vec<String>, SinkReport) {
    let empty = serde_json::Map::new();
    let m = row.as_object().unwrap_or(&empty);
    let cells: Vec<String> = headers
        .iter()
        .map(|h| m.get(h.trim()).map(coerce_cell_value).unwrap_or_default())
        .collect();
    debug!("build_row: cells: {:?}", cells);

    let header_set: HashSet<&str> = headers.iter().map(|h| h.trim()).collect();
    let ignored_keys: Vec<String> = m
        .keys()
        .filter(|k| !header_set.contains(k.as_str()))
        .cloned()
        .collect();
    let blank_columns: Vec<String> = headers
        .iter()
        .filter(|h| !h.trim().is_empty() && !m.contains_key(h.trim()))
        .cloned()
        .collect();
    (
        cells,
        SinkReport {
            ignored_keys,
            blank_columns,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cell_values() {
        assert_eq!(coerce_cell_value(&json!(null)), "");
        assert_eq!(coerce_cell_value(&json!("75 %")), "75 %");
        assert_eq!(coerce_cell_value(&json!(["a", null, " ", "b"])), "a • b");
        assert_eq!(coerce_cell_value(&json!({"auteur": "X"})), r#"{"auteur":"X"}"#);
        assert_eq!(coerce_cell_value(&json!(8.5)), "8.5");
    }

    #[test]
    fn rows_follow_the_headers() {
        let headers = vec![
            "Semestre".to_string(),
            " Formation ".to_string(),
            "Commentaire libre".to_string(),
        ];
        let row = json!({"Formation": "AFGSU 1", "Semestre": "S1", "meta_generation": {"mode": "m"}});
        let (cells, report) = build_row(&headers, &row);
        assert_eq!(cells, vec!["S1", "AFGSU 1", ""]);
        assert_eq!(report.ignored_keys, vec!["meta_generation".to_string()]);
        assert_eq!(report.blank_columns, vec!["Commentaire libre".to_string()]);
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/tmp/rapports/afgsu.json").unwrap(), "afgsu.json");
        assert!(simplify_file_name("/").is_err());
    }
}
