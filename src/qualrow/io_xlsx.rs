// Reads the columns of the consolidated spreadsheet from an Excel template.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::qualrow::*;

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Empty => "".to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// The first non-empty row of the worksheet, trimmed. Trailing empty cells are dropped.
pub fn read_template_headers(path: &str, sheet: &str) -> QualrowResult<Vec<String>> {
    debug!("read_template_headers: path: {:?} worksheet: {:?}", path, sheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range(sheet)
        .context(MissingSheetSnafu { sheet })?
        .context(OpeningExcelSnafu { path })?;

    let header = wrange
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
        .find(|cells| cells.iter().any(|c| !c.is_empty()))
        .context(EmptyExcelSnafu { sheet })?;

    let last = header.iter().rposition(|c| !c.is_empty()).unwrap_or(0);
    let headers: Vec<String> = header.into_iter().take(last + 1).collect();
    debug!("read_template_headers: headers: {:?}", headers);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_as_text() {
        assert_eq!(cell_text(&DataType::String(" Formation ".to_string())), "Formation");
        assert_eq!(cell_text(&DataType::Empty), "");
        assert_eq!(cell_text(&DataType::Int(3)), "3");
    }

    #[test]
    fn missing_template() {
        let res = read_template_headers("/nonexistent/modele.xlsx", "Formations");
        assert!(matches!(res, Err(QualrowError::OpeningExcel { .. })));
    }
}
