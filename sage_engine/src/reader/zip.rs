//! ZIP archive unpacking via the `zip` crate: list entries and read one
//! by name (`spec.md` §4.3's archive dispatch).

use std::io::{Cursor, Read};

use super::ReaderError;

pub fn list_entries(bytes: &[u8]) -> Result<Vec<String>, ReaderError> {
    let cursor = Cursor::new(bytes);
    let archive = zip::ZipArchive::new(cursor).map_err(|e| ReaderError::Zip(e.to_string()))?;
    Ok(archive.file_names().map(str::to_owned).collect())
}

pub fn read_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>, ReaderError> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| ReaderError::Zip(e.to_string()))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| ReaderError::Zip(format!("entry '{name}' not found: {e}")))?;
    let mut out = Vec::new();
    entry.read_to_end(&mut out).map_err(|e| ReaderError::Zip(e.to_string()))?;
    Ok(out)
}
