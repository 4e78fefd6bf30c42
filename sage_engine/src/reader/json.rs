//! JSON decoding: accepts either a bare array of objects or an object
//! with a `records` key holding the array (`spec.md` §4.3).

use serde_json::Value;

use crate::model::{CellValue, Table};

use super::ReaderError;

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum JsonTablePayload {
    Records { records: Vec<serde_json::Map<String, Value>> },
    Array(Vec<serde_json::Map<String, Value>>),
}

pub fn decode(bytes: &[u8]) -> Result<Table, ReaderError> {
    let payload: JsonTablePayload =
        serde_json::from_slice(bytes).map_err(|e| ReaderError::Json(e.to_string()))?;
    let records = match payload {
        JsonTablePayload::Records { records } => records,
        JsonTablePayload::Array(records) => records,
    };

    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .into_iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| match record.get(col) {
                    None | Some(Value::Null) => CellValue::Null,
                    Some(Value::String(s)) => {
                        if s.is_empty() {
                            CellValue::Null
                        } else {
                            CellValue::Text(s.clone())
                        }
                    }
                    Some(Value::Number(n)) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
                    Some(Value::Bool(b)) => CellValue::Text(b.to_string()),
                    Some(other) => CellValue::Text(other.to_string()),
                })
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_array_of_objects() {
        let table = decode(br#"[{"a": 1, "b": "x"}, {"a": 2}]"#).unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows[1], vec![CellValue::Number(2.0), CellValue::Null]);
    }

    #[test]
    fn decodes_records_wrapper() {
        let table = decode(br#"{"records": [{"a": 1}]}"#).unwrap();
        assert_eq!(table.columns, vec!["a"]);
        assert_eq!(table.rows[0], vec![CellValue::Number(1.0)]);
    }
}
