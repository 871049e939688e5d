// Appends rows to a CSV table.

use std::fs::OpenOptions;

use crate::qualrow::{
    io_common::{build_row, SinkReport},
    *,
};

/// The header row of an existing table, or `None` if the file is missing or empty.
fn existing_headers(path: &str) -> QualrowResult<Option<Vec<String>>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let first = rdr.records().next();
    match first {
        Some(r) => {
            let record = r.context(CsvOpenSnafu { path })?;
            Ok(Some(record.iter().map(|s| s.to_string()).collect()))
        }
        None => Ok(None),
    }
}

/// Appends one row to the table at `path`. A new table gets `default_headers`
/// as its first row; an existing table keeps its own columns.
pub fn append_row(
    path: &str,
    default_headers: &[String],
    row: &JSValue,
) -> QualrowResult<SinkReport> {
    let headers = existing_headers(path)?;
    let is_new = headers.is_none();
    let headers = headers.unwrap_or_else(|| default_headers.to_vec());
    debug!("append_row: {} headers: {:?}", path, headers);

    let (cells, report) = build_row(&headers, row);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(WritingFileSnafu { path })?;
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);
    if is_new {
        wtr.write_record(&headers).context(CsvWriteSnafu { path })?;
    }
    wtr.write_record(&cells).context(CsvWriteSnafu { path })?;
    wtr.flush().context(WritingFileSnafu { path })?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn table_in(tmp: &TempDir) -> String {
        tmp.path().join("formations.csv").display().to_string()
    }

    #[test]
    fn new_table_gets_headers() {
        let tmp = TempDir::new().unwrap();
        let path = table_in(&tmp);
        let headers = vec!["Formation".to_string(), "Semestre".to_string()];
        let row = json!({"Formation": "AFGSU 1", "Semestre": "S1 2025", "Synthese": ""});
        let report = append_row(&path, &headers, &row).unwrap();
        assert_eq!(report.ignored_keys, vec!["Synthese".to_string()]);
        append_row(&path, &headers, &json!({"Formation": "PSC1, niveau 2"})).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec!["Formation,Semestre", "AFGSU 1,S1 2025", "\"PSC1, niveau 2\","]
        );
    }

    #[test]
    fn existing_table_keeps_its_columns() {
        let tmp = TempDir::new().unwrap();
        let path = table_in(&tmp);
        std::fs::write(&path, "Semestre,Note /10 à chaud\n").unwrap();
        let defaults = vec!["Formation".to_string()];
        let report = append_row(
            &path,
            &defaults,
            &json!({"Formation": "AFGSU 1", "Note /10 à chaud": "8.5/10"}),
        )
        .unwrap();
        assert_eq!(report.ignored_keys, vec!["Formation".to_string()]);
        assert_eq!(report.blank_columns, vec!["Semestre".to_string()]);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Semestre,Note /10 à chaud\n,8.5/10\n");
    }
}
