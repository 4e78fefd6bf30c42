//! CSV decoding via the `csv` crate, with `encoding_rs` handling
//! non-UTF-8 declared encodings.

use crate::model::{CellValue, Table};

use super::ReaderError;

pub fn decode(bytes: &[u8], encoding: &str, separator: char) -> Result<Table, ReaderError> {
    let decoded = decode_bytes(bytes, encoding)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(decoded.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ReaderError::Csv(e.to_string()))?
        .iter()
        .map(str::to_owned)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReaderError::Csv(e.to_string()))?;
        let mut row = Vec::with_capacity(headers.len());
        for idx in 0..headers.len() {
            let value = record.get(idx).unwrap_or("");
            row.push(if value.is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(value.to_owned())
            });
        }
        rows.push(row);
    }

    Ok(Table { columns: headers, rows })
}

fn decode_bytes(bytes: &[u8], encoding: &str) -> Result<String, ReaderError> {
    if encoding.eq_ignore_ascii_case("utf-8") {
        return String::from_utf8(bytes.to_vec()).map_err(|e| ReaderError::Encoding(e.to_string()));
    }
    let enc = encoding_rs::Encoding::for_label(encoding.as_bytes())
        .ok_or_else(|| ReaderError::Encoding(format!("unknown encoding '{encoding}'")))?;
    let (decoded, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(ReaderError::Encoding(format!("invalid bytes for encoding '{encoding}'")));
    }
    Ok(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_csv_with_nulls() {
        let table = decode(b"a,b\n1,\n2,x\n", "utf-8", ',').unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows[0], vec![CellValue::Text("1".into()), CellValue::Null]);
        assert_eq!(table.rows[1], vec![CellValue::Text("2".into()), CellValue::Text("x".into())]);
    }

    #[test]
    fn honors_custom_separator() {
        let table = decode(b"a;b\n1;2\n", "utf-8", ';').unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows[0], vec![CellValue::Text("1".into()), CellValue::Text("2".into())]);
    }
}
