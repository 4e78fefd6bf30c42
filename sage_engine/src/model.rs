//! The in-memory Schema: Catalog, Package, Sender, and their nested types.
//!
//! [`Schema`] owns two flat arrays (`catalogs`, `packages`); cross-
//! references resolved by the loader are integer handles
//! (`CatalogHandle`) into `Schema.catalogs`, never `Rc` or raw pointers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Index into [`Schema::catalogs`]. Stable for the lifetime of one loaded
/// `Schema`; never serialized, always resolved fresh from `logical_name`
/// when a `Schema` is reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogHandle(pub usize);

/// A field's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Enum,
}

/// Severity attached to a [`FieldRule`] or validation expression.
pub use crate::finding::Severity as RuleSeverity;

/// One rule attached to a field: an expression that must hold for every
/// row, evaluated in vector mode.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub validation_expression: Expr,
    pub message: String,
    pub severity: RuleSeverity,
}

/// The full contract for one column of a [`Catalog`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    /// Max character count for text, max total digits for number.
    pub length: Option<u32>,
    /// Decimal places permitted for `number` fields (default 0).
    pub decimals: u32,
    pub required: bool,
    pub unique: bool,
    /// Required and non-empty when `field_type == Enum`.
    pub allowed_values: Option<Vec<String>>,
    pub rules: Vec<FieldRule>,
}

/// An Expression attached at row or catalog scope, with its own message
/// and severity (defaulting to `Error` when not declared).
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedValidation {
    pub expression: Expr,
    pub message: String,
    pub severity: RuleSeverity,
}

/// Filename pattern for a catalog or package archive, with `{sender_id}`
/// and `{date}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFormat {
    pub archive_type: ArchiveType,
    pub pattern: String,
    /// Declared encoding for text-based formats (default `"utf-8"`).
    pub encoding: String,
    /// Declared field separator for CSV (default `,`).
    pub separator: char,
}

impl Default for FileFormat {
    fn default() -> Self {
        Self {
            archive_type: ArchiveType::Csv,
            pattern: String::new(),
            encoding: "utf-8".to_owned(),
            separator: ',',
        }
    }
}

/// The physical container format a file arrives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Csv,
    Xlsx,
    Json,
    Xml,
    Zip,
}

/// Named tabular contract: the schema of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSpec>,
    pub row_validation: Option<ScopedValidation>,
    pub catalog_validation: Option<ScopedValidation>,
    pub file_format: Option<FileFormat>,
}

impl Catalog {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One entry in a [`Package`]'s catalog list.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRef {
    pub logical_name: String,
    pub file_inside_archive: Option<String>,
    pub catalog: CatalogHandle,
    /// Per-file format override (falls back to the catalog's own
    /// `file_format` when absent).
    pub file_format_override: Option<FileFormat>,
}

/// A predicate over multiple catalog tables in a package.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossRule {
    pub name: String,
    pub validation_expression: Expr,
    pub severity: RuleSeverity,
    pub message: String,
}

/// How Sink rows map onto a row insertion semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertionMethod {
    Insert,
    Upsert,
    Replace,
}

/// Supported relational backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Postgresql,
    Mysql,
    Sqlserver,
    Oracle,
}

/// Database connection parameters, or a named environment-resolved secret.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionConfig {
    Explicit {
        driver: Driver,
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
    /// Resolved against environment variables at load time, so by the
    /// time a `Schema` exists this has already been folded into
    /// `Explicit` — kept as a variant only to preserve the original
    /// document's declared shape (`secret_ref:` vs. explicit fields).
    SecretRef(String),
}

/// HTTP callback consulted before a Sink transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub struct PreValidation {
    pub endpoint: String,
    pub method: String,
    /// Opaque payload forwarded verbatim; the engine never interprets
    /// its `checks` field.
    pub payload: serde_json::Value,
}

/// Where and how a package's validated rows are written.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub enabled: bool,
    pub connection: ConnectionConfig,
    pub target_table: String,
    pub pre_validation: Option<PreValidation>,
    pub insertion_method: InsertionMethod,
}

/// A bundle of catalogs validated together, with cross-catalog rules and
/// a database destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub description: String,
    pub mandatory: bool,
    pub file_format: FileFormat,
    pub catalogs: Vec<CatalogRef>,
    pub cross_rules: Vec<CrossRule>,
    pub destination: Destination,
}

impl Package {
    #[must_use]
    pub fn catalog_ref(&self, logical_name: &str) -> Option<&CatalogRef> {
        self.catalogs.iter().find(|c| c.logical_name == logical_name)
    }
}

/// Intake channel a [`Sender`] may submit through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sftp,
    Email,
    Api,
    Filesystem,
    DirectUpload,
}

/// Per-channel credentials checked by the Sender Gate (§4.6 step 5).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelConfig {
    pub api_key: Option<String>,
    pub allowed_senders: Vec<String>,
    pub allowed_hosts: Vec<String>,
}

/// How often a sender is expected to submit, and by when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionFrequency {
    pub frequency: Frequency,
    /// Local time-of-day deadline, `HH:MM`.
    pub deadline: String,
}

/// An authorized producer of submissions.
#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    pub sender_id: String,
    pub responsible_person: String,
    pub allowed_methods: Vec<Channel>,
    pub channel_config: HashMap<Channel, ChannelConfig>,
    pub submission_frequency: SubmissionFrequency,
    pub packages: Vec<String>,
}

/// An ephemeral submission: one file arriving at the system, tagged with
/// a sender and a declared package. Created by the Run Controller and
/// consumed by the Gate/Reader/Validator/Sink pipeline; nothing in the
/// engine persists it past one `controller::process` call.
#[derive(Debug, Clone)]
pub struct Submission {
    pub sender_id: String,
    pub package_name: String,
    pub channel: Channel,
    pub blob: Vec<u8>,
    pub filename: String,
    pub receipt_time: chrono::DateTime<chrono::Utc>,
    /// Per-channel credential presented at intake (api key, envelope
    /// sender address, or source host), checked by Gate step 5.
    pub channel_credential: Option<String>,
}

/// The fully resolved, read-only Schema. Owns two flat arrays; every
/// cross-reference inside `packages` is a [`CatalogHandle`] into
/// `catalogs`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub catalogs: Vec<Catalog>,
    pub packages: Vec<Package>,
    pub senders: Vec<Sender>,
}

impl Schema {
    #[must_use]
    pub fn catalog(&self, handle: CatalogHandle) -> &Catalog {
        &self.catalogs[handle.0]
    }

    #[must_use]
    pub fn catalog_by_name(&self, name: &str) -> Option<(CatalogHandle, &Catalog)> {
        self.catalogs
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
            .map(|(i, c)| (CatalogHandle(i), c))
    }

    #[must_use]
    pub fn package_by_name(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn sender_by_id(&self, sender_id: &str) -> Option<&Sender> {
        self.senders.iter().find(|s| s.sender_id == sender_id)
    }
}

// ---------------------------------------------------------------------------
// Tabular value model consumed by the Expression Engine and Validator
// ---------------------------------------------------------------------------

/// One cell in an in-memory [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    /// Stored as a parsed, tolerant-parser-accepted calendar date (UTC
    /// midnight) so comparisons don't need to re-parse per evaluation.
    Date(chrono::NaiveDate),
    Null,
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Render for display in a Finding's `observed_value`.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            CellValue::Date(d) => d.to_string(),
            CellValue::Null => "null".to_owned(),
        }
    }
}

/// An in-memory table: ordered columns, ordered rows. Rows are addressed
/// by a 1-based index in Findings, matching the Reader's convention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_by_name_returns_handle() {
        let schema = Schema {
            catalogs: vec![Catalog {
                name: "ventas".to_owned(),
                description: String::new(),
                fields: Vec::new(),
                row_validation: None,
                catalog_validation: None,
                file_format: None,
            }],
            packages: Vec::new(),
            senders: Vec::new(),
        };
        let (handle, catalog) = schema.catalog_by_name("ventas").unwrap();
        assert_eq!(handle.0, 0);
        assert_eq!(catalog.name, "ventas");
        assert!(schema.catalog_by_name("missing").is_none());
    }

    #[test]
    fn table_column_lookup() {
        let table = Table {
            columns: vec!["a".to_owned(), "b".to_owned()],
            rows: vec![vec![CellValue::Number(1.0), CellValue::Null]],
        };
        assert_eq!(table.column_index("b"), Some(1));
        assert_eq!(table.column("a").unwrap(), vec![&CellValue::Number(1.0)]);
    }

    #[test]
    fn cell_value_display_formats_integers_without_decimal() {
        assert_eq!(CellValue::Number(3.0).display(), "3");
        assert_eq!(CellValue::Number(3.5).display(), "3.5");
    }
}
