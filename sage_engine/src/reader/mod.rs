//! File Reader: decodes a submitted blob into a map from `logical_name`
//! to an in-memory [`Table`].

mod csv;
pub mod filename;
mod json;
mod xlsx;
mod xml;
mod zip;

use std::collections::HashMap;

use crate::finding::{Diagnostic, Finding, Locator, Scope, Severity};
use crate::model::{ArchiveType, Catalog, FileFormat, Package, Schema, Table};

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("csv decode error: {0}")]
    Csv(String),
    #[error("xlsx decode error: {0}")]
    Xlsx(String),
    #[error("json decode error: {0}")]
    Json(String),
    #[error("xml decode error: {0}")]
    Xml(String),
    #[error("zip decode error: {0}")]
    Zip(String),
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Decode `blob` (named `filename`, submitted by `sender_id`) per the
/// package's declared archive type and catalog references. Always
/// returns whatever tables could be decoded, alongside a [`Diagnostic`]
/// carrying every file-scope Finding the decode produced — a partially
/// readable archive is still handed to the Validator, since partial
/// diagnosis is more useful than a first-error abort.
pub fn read_package(
    schema: &Schema,
    package: &Package,
    blob: &[u8],
    filename: &str,
    sender_id: &str,
) -> (HashMap<String, Table>, Diagnostic) {
    let mut diagnostic = Diagnostic::new();
    let mut tables = HashMap::new();

    if !filename::matches(&package.file_format.pattern, filename, sender_id) {
        diagnostic.push(Finding::new(
            Severity::Error,
            Scope::File,
            Locator::default(),
            format!(
                "filename '{filename}' does not match declared pattern '{}'",
                package.file_format.pattern
            ),
        ));
        return (tables, diagnostic);
    }

    match package.file_format.archive_type {
        ArchiveType::Zip => read_zip_package(schema, package, blob, sender_id, &mut tables, &mut diagnostic),
        single => read_single_file_package(schema, package, blob, single, &mut tables, &mut diagnostic),
    }

    for (logical_name, table) in &tables {
        if let Some(catalog) = catalog_for(schema, package, logical_name) {
            check_unknown_columns(catalog, table, &mut diagnostic);
            check_duplicate_headers(logical_name, table, &mut diagnostic);
        }
    }

    (tables, diagnostic)
}

fn read_single_file_package(
    schema: &Schema,
    package: &Package,
    blob: &[u8],
    archive_type: ArchiveType,
    tables: &mut HashMap<String, Table>,
    diagnostic: &mut Diagnostic,
) {
    let Some(catalog_ref) = package.catalogs.first() else {
        return;
    };
    let Some(catalog) = schema.catalogs.get(catalog_ref.catalog.0) else {
        return;
    };
    let format = effective_format(catalog_ref.file_format_override.as_ref(), catalog);
    match decode(blob, archive_type, &format) {
        Ok(table) => {
            tables.insert(catalog_ref.logical_name.clone(), table);
        }
        Err(e) => diagnostic.push(file_error(&e)),
    }
}

fn read_zip_package(
    schema: &Schema,
    package: &Package,
    blob: &[u8],
    sender_id: &str,
    tables: &mut HashMap<String, Table>,
    diagnostic: &mut Diagnostic,
) {
    let entries = match zip::list_entries(blob) {
        Ok(entries) => entries,
        Err(e) => {
            diagnostic.push(file_error(&e));
            return;
        }
    };

    for catalog_ref in &package.catalogs {
        let Some(catalog) = schema.catalogs.get(catalog_ref.catalog.0) else {
            continue;
        };
        let format = effective_format(catalog_ref.file_format_override.as_ref(), catalog);
        let entry_name = entries.iter().find(|&entry| {
            catalog_ref
                .file_inside_archive
                .as_deref()
                .map(|expected| entry == expected)
                .unwrap_or_else(|| filename::matches(&format.pattern, entry, sender_id))
        });
        match entry_name {
            Some(entry_name) => match zip::read_entry(blob, entry_name) {
                Ok(bytes) => match decode(&bytes, format.archive_type, &format) {
                    Ok(table) => {
                        tables.insert(catalog_ref.logical_name.clone(), table);
                    }
                    Err(e) => diagnostic.push(file_error(&e)),
                },
                Err(e) => diagnostic.push(file_error(&e)),
            },
            None => diagnostic.push(Finding::new(
                Severity::Error,
                Scope::File,
                Locator::catalog(&catalog_ref.logical_name),
                format!("no archive entry matched catalog '{}'", catalog_ref.logical_name),
            )),
        }
    }

    let declared: Vec<String> = package
        .catalogs
        .iter()
        .filter_map(|c| c.file_inside_archive.clone())
        .collect();
    for entry in &entries {
        let matched = declared.iter().any(|d| d == entry)
            || package.catalogs.iter().any(|c| {
                let catalog = schema.catalogs.get(c.catalog.0);
                catalog
                    .map(|cat| effective_format(c.file_format_override.as_ref(), cat))
                    .map(|fmt| filename::matches(&fmt.pattern, entry, sender_id))
                    .unwrap_or(false)
            });
        if !matched {
            diagnostic.push(Finding::new(
                Severity::Error,
                Scope::File,
                Locator::default(),
                format!("archive entry '{entry}' matches no declared catalog file"),
            ));
        }
    }
}

fn effective_format(override_fmt: Option<&FileFormat>, catalog: &Catalog) -> FileFormat {
    override_fmt
        .cloned()
        .or_else(|| catalog.file_format.clone())
        .unwrap_or_default()
}

fn decode(bytes: &[u8], archive_type: ArchiveType, format: &FileFormat) -> Result<Table, ReaderError> {
    match archive_type {
        ArchiveType::Csv => csv::decode(bytes, &format.encoding, format.separator),
        ArchiveType::Xlsx => xlsx::decode(bytes),
        ArchiveType::Json => json::decode(bytes),
        ArchiveType::Xml => xml::decode(bytes),
        ArchiveType::Zip => unreachable!("nested zip entries decode to their own inner format"),
    }
}

fn file_error(e: &ReaderError) -> Finding {
    Finding::new(Severity::Error, Scope::File, Locator::default(), e.to_string())
}

fn catalog_for<'a>(schema: &'a Schema, package: &Package, logical_name: &str) -> Option<&'a Catalog> {
    package
        .catalog_ref(logical_name)
        .and_then(|r| schema.catalogs.get(r.catalog.0))
}

fn check_unknown_columns(catalog: &Catalog, table: &Table, diagnostic: &mut Diagnostic) {
    for column in &table.columns {
        if catalog.field(column).is_none() {
            diagnostic.push(
                Finding::new(
                    Severity::Info,
                    Scope::Catalog,
                    Locator::catalog(&catalog.name),
                    format!("column '{column}' is not declared in catalog '{}'", catalog.name),
                )
                .with_observed_value(column.clone()),
            );
        }
    }
}

fn check_duplicate_headers(logical_name: &str, table: &Table, diagnostic: &mut Diagnostic) {
    let mut seen = std::collections::HashSet::new();
    for column in &table.columns {
        if !seen.insert(column) {
            diagnostic.push(Finding::new(
                Severity::Error,
                Scope::Catalog,
                Locator::catalog(logical_name),
                format!("duplicate column header '{column}'"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CatalogRef, Destination, InsertionMethod, ConnectionConfig};

    fn minimal_catalog(name: &str) -> Catalog {
        Catalog {
            name: name.to_owned(),
            description: String::new(),
            fields: vec![crate::model::FieldSpec {
                name: "a".to_owned(),
                field_type: crate::model::FieldType::Text,
                length: None,
                decimals: 0,
                required: false,
                unique: false,
                allowed_values: None,
                rules: Vec::new(),
            }],
            row_validation: None,
            catalog_validation: None,
            file_format: None,
        }
    }

    fn minimal_package(catalog_handle: crate::model::CatalogHandle) -> Package {
        Package {
            name: "pkg".to_owned(),
            description: String::new(),
            mandatory: true,
            file_format: FileFormat {
                archive_type: ArchiveType::Csv,
                pattern: "ventas_{sender_id}_{date}.csv".to_owned(),
                encoding: "utf-8".to_owned(),
                separator: ',',
            },
            catalogs: vec![CatalogRef {
                logical_name: "ventas".to_owned(),
                file_inside_archive: None,
                catalog: catalog_handle,
                file_format_override: None,
            }],
            cross_rules: Vec::new(),
            destination: Destination {
                enabled: false,
                connection: ConnectionConfig::SecretRef("X".into()),
                target_table: "ventas".into(),
                pre_validation: None,
                insertion_method: InsertionMethod::Insert,
            },
        }
    }

    #[test]
    fn reads_single_csv_file_matching_pattern() {
        let schema = Schema {
            catalogs: vec![minimal_catalog("ventas")],
            packages: Vec::new(),
            senders: Vec::new(),
        };
        let package = minimal_package(crate::model::CatalogHandle(0));
        let (tables, diagnostic) = read_package(
            &schema,
            &package,
            b"a\n1\n2\n",
            "ventas_TEST001_20260101.csv",
            "TEST001",
        );
        assert!(!diagnostic.has_errors());
        assert_eq!(tables["ventas"].rows.len(), 2);
    }

    #[test]
    fn filename_mismatch_is_a_fatal_finding() {
        let schema = Schema {
            catalogs: vec![minimal_catalog("ventas")],
            packages: Vec::new(),
            senders: Vec::new(),
        };
        let package = minimal_package(crate::model::CatalogHandle(0));
        let (tables, diagnostic) = read_package(&schema, &package, b"a\n1\n", "wrong.csv", "TEST001");
        assert!(diagnostic.has_errors());
        assert!(tables.is_empty());
    }

    #[test]
    fn unknown_column_is_an_info_finding() {
        let schema = Schema {
            catalogs: vec![minimal_catalog("ventas")],
            packages: Vec::new(),
            senders: Vec::new(),
        };
        let package = minimal_package(crate::model::CatalogHandle(0));
        let (_, diagnostic) = read_package(
            &schema,
            &package,
            b"a,extra\n1,x\n",
            "ventas_TEST001_20260101.csv",
            "TEST001",
        );
        assert!(diagnostic
            .findings
            .iter()
            .any(|f| f.severity == Severity::Info && f.message.contains("extra")));
    }
}
