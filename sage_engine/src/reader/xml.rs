//! XML decoding via `quick-xml`: a root element whose immediate children
//! are records, whose sub-elements are fields (`spec.md` §4.3).

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::model::{CellValue, Table};

use super::ReaderError;

pub fn decode(bytes: &[u8]) -> Result<Table, ReaderError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<std::collections::HashMap<String, String>> = Vec::new();

    let mut depth = 0u32;
    let mut current_record: Option<std::collections::HashMap<String, String>> = None;
    let mut current_field: Option<(String, String)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| ReaderError::Xml(e.to_string()))? {
            Event::Start(e) => {
                depth += 1;
                let name = tag_name(&e);
                if depth == 2 {
                    current_record = Some(std::collections::HashMap::new());
                } else if depth == 3 {
                    current_field = Some((name, String::new()));
                }
            }
            Event::Text(t) => {
                if let Some((_, ref mut text)) = current_field {
                    text.push_str(&t.unescape().map_err(|e| ReaderError::Xml(e.to_string()))?);
                }
            }
            Event::End(_) => {
                if depth == 3 {
                    if let (Some((name, text)), Some(record)) = (current_field.take(), current_record.as_mut()) {
                        if !columns.contains(&name) {
                            columns.push(name.clone());
                        }
                        record.insert(name, text);
                    }
                } else if depth == 2 {
                    if let Some(record) = current_record.take() {
                        rows.push(record);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let rows = rows
        .into_iter()
        .map(|record: std::collections::HashMap<String, String>| {
            columns
                .iter()
                .map(|col| match record.get(col) {
                    None => CellValue::Null,
                    Some(s) if s.is_empty() => CellValue::Null,
                    Some(s) => CellValue::Text(s.clone()),
                })
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}

fn tag_name(e: &quick_xml::events::BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_records_with_fields() {
        let xml = br#"<root><record><a>1</a><b>x</b></record><record><a>2</a><b></b></record></root>"#;
        let table = decode(xml).unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows[0], vec![CellValue::Text("1".into()), CellValue::Text("x".into())]);
        assert_eq!(table.rows[1], vec![CellValue::Text("2".into()), CellValue::Null]);
    }
}
