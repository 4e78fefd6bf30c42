//! XLSX/XLS decoding via `calamine`: the first worksheet, headers on the
//! first row (`spec.md` §4.3). Not grounded in the retrieval pack — see
//! `DESIGN.md` for the enrichment note.

use std::io::Cursor;

use calamine::{Data, Reader as _};

use crate::model::{CellValue, Table};

use super::ReaderError;

pub fn decode(bytes: &[u8]) -> Result<Table, ReaderError> {
    let cursor = Cursor::new(bytes);
    let mut workbook: calamine::Xlsx<_> =
        calamine::open_workbook_from_rs(cursor).map_err(|e| ReaderError::Xlsx(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReaderError::Xlsx("workbook has no worksheets".to_owned()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ReaderError::Xlsx(e.to_string()))?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().ok_or_else(|| ReaderError::Xlsx("worksheet is empty".to_owned()))?;
    let columns: Vec<String> = header_row.iter().map(cell_to_string).collect();

    let rows = rows_iter
        .map(|row| (0..columns.len()).map(|idx| row.get(idx).map(cell_value).unwrap_or(CellValue::Null)).collect())
        .collect();

    Ok(Table { columns, rows })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        _ => CellValue::Null,
    }
}
