//! Schema Loader: turns catalog/package/sender YAML documents into the
//! resolved [`Schema`] arena.
//!
//! Two-phase: documents deserialize first into the permissive [`raw`]
//! structs, then [`resolve`][mod@self] walks those into the immutable
//! `model` types, rejecting anything the document's structural contract
//! forbids.

pub mod raw;
pub mod secrets;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::expr::{self, Expr};
use crate::finding::{Finding, Locator, Scope, Severity};
use crate::model::{
    ArchiveType, CatalogHandle, Channel, ChannelConfig, ConnectionConfig, Driver, FieldRule,
    FieldSpec, FieldType, FileFormat, Frequency, InsertionMethod, PreValidation, ScopedValidation,
    Sender, SubmissionFrequency,
};
use crate::model::{Catalog, CatalogRef, CrossRule, Destination, Package};

use raw::{
    RawCatalog, RawCatalogDocument, RawConnection, RawField, RawFieldRule, RawFileFormat,
    RawPackageDocument, RawSenderDocument, RawValidation,
};

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("could not read '{0}': {1}")]
    Io(String, String),
    #[error("could not parse '{0}' as YAML: {1}")]
    Yaml(String, String),
    #[error("{0}")]
    Structural(String),
    #[error("circular document reference at '{0}'")]
    CircularReference(String),
    #[error("invalid expression in '{0}': {1}")]
    Expression(String, #[source] expr::ParseError),
    #[error(transparent)]
    Secret(#[from] secrets::SecretError),
}

impl LoaderError {
    /// Render as the fatal, scope=`file` Finding every structural
    /// failure produces.
    #[must_use]
    pub fn into_finding(self, doc_path: &Path) -> Finding {
        Finding::new(
            Severity::Error,
            Scope::File,
            Locator::default(),
            self.to_string(),
        )
        .with_observed_value(doc_path.display().to_string())
    }
}

/// Owns the catalog arena as documents are loaded, so packages can
/// resolve `CatalogHandle`s as they parse instead of in a second pass.
pub struct Loader {
    catalogs: Vec<Catalog>,
    catalog_index: HashMap<String, CatalogHandle>,
    /// Recursion stack of canonical paths currently being resolved, used
    /// to detect `package -> catalog -> package` style cycles.
    stack: HashSet<PathBuf>,
}

impl Loader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalogs: Vec::new(),
            catalog_index: HashMap::new(),
            stack: HashSet::new(),
        }
    }

    /// Consume the loader, returning every catalog collected so far
    /// (directly loaded or discovered through a package's `catalogs:` list).
    #[must_use]
    pub fn into_catalogs(self) -> Vec<Catalog> {
        self.catalogs
    }

    fn register_catalog(&mut self, catalog: Catalog) -> CatalogHandle {
        if let Some(&handle) = self.catalog_index.get(&catalog.name) {
            return handle;
        }
        let handle = CatalogHandle(self.catalogs.len());
        self.catalog_index.insert(catalog.name.clone(), handle);
        self.catalogs.push(catalog);
        handle
    }

    fn enter(&mut self, path: &Path) -> Result<PathBuf, LoaderError> {
        let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !self.stack.insert(canon.clone()) {
            return Err(LoaderError::CircularReference(canon.display().to_string()));
        }
        Ok(canon)
    }

    fn exit(&mut self, canon: &Path) {
        self.stack.remove(canon);
    }

    pub fn load_catalog_file(&mut self, path: &Path) -> Result<CatalogHandle, LoaderError> {
        let canon = self.enter(path)?;
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoaderError::Io(path.display().to_string(), e.to_string()))?;
        let result = self.load_catalog_str(&text, path);
        self.exit(&canon);
        Ok(self.register_catalog(result?))
    }

    pub fn load_catalog_str(&self, text: &str, path: &Path) -> Result<Catalog, LoaderError> {
        let doc: RawCatalogDocument = serde_yaml::from_str(text)
            .map_err(|e| LoaderError::Yaml(path.display().to_string(), e.to_string()))?;
        resolve_catalog(&doc.catalog)
    }

    pub fn load_package_file(&mut self, path: &Path) -> Result<Package, LoaderError> {
        let canon = self.enter(path)?;
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoaderError::Io(path.display().to_string(), e.to_string()))?;
        let result = self.load_package_str(&text, path);
        self.exit(&canon);
        result
    }

    pub fn load_package_str(&mut self, text: &str, path: &Path) -> Result<Package, LoaderError> {
        let doc: RawPackageDocument = serde_yaml::from_str(text)
            .map_err(|e| LoaderError::Yaml(path.display().to_string(), e.to_string()))?;
        let raw = doc.package;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        if raw.catalogs.is_empty() {
            return Err(LoaderError::Structural(
                "package must declare at least one catalog".to_owned(),
            ));
        }

        let mut catalog_refs = Vec::with_capacity(raw.catalogs.len());
        let mut seen_logical_names = HashSet::new();
        for rc in raw.catalogs {
            if !seen_logical_names.insert(rc.logical_name.clone()) {
                return Err(LoaderError::Structural(format!(
                    "duplicate catalog logical name '{}' in package",
                    rc.logical_name
                )));
            }
            let handle = match (&rc.path, &rc.components) {
                (Some(rel), _) => self.load_catalog_file(&base_dir.join(rel))?,
                (None, Some(inline)) => self.register_catalog(resolve_catalog(inline)?),
                (None, None) => {
                    return Err(LoaderError::Structural(format!(
                        "catalog reference '{}' must declare either 'path' or 'components'",
                        rc.logical_name
                    )))
                }
            };
            let file_format_override = rc
                .file_format_override
                .as_ref()
                .map(resolve_file_format)
                .transpose()?;
            catalog_refs.push(CatalogRef {
                logical_name: rc.logical_name,
                file_inside_archive: rc.file_inside_archive,
                catalog: handle,
                file_format_override,
            });
        }

        let mut cross_rules = Vec::with_capacity(raw.cross_rules.len());
        for rule in raw.cross_rules {
            let expression = expr::parse(&rule.validation_expression)
                .map_err(|e| LoaderError::Expression(rule.name.clone(), e))?;
            for table in collect_table_refs(&expression) {
                if !seen_logical_names.contains(&table) {
                    return Err(LoaderError::Structural(format!(
                        "cross rule '{}' references undeclared logical name '{table}'",
                        rule.name
                    )));
                }
            }
            cross_rules.push(CrossRule {
                name: rule.name,
                validation_expression: expression,
                severity: parse_severity(rule.severity.as_deref())?,
                message: rule.message,
            });
        }

        let destination = resolve_destination(raw.destination)?;

        Ok(Package {
            name: raw.name,
            description: raw.description,
            mandatory: raw.mandatory,
            file_format: resolve_file_format(&raw.file_format)?,
            catalogs: catalog_refs,
            cross_rules,
            destination,
        })
    }

    pub fn load_sender_file(&mut self, path: &Path) -> Result<Vec<Sender>, LoaderError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoaderError::Io(path.display().to_string(), e.to_string()))?;
        self.load_sender_str(&text, path)
    }

    pub fn load_sender_str(&self, text: &str, path: &Path) -> Result<Vec<Sender>, LoaderError> {
        let doc: RawSenderDocument = serde_yaml::from_str(text)
            .map_err(|e| LoaderError::Yaml(path.display().to_string(), e.to_string()))?;
        let mut seen_ids = HashSet::new();
        let mut senders = Vec::with_capacity(doc.senders_list.len());
        for raw in doc.senders_list {
            if !seen_ids.insert(raw.sender_id.clone()) {
                return Err(LoaderError::Structural(format!(
                    "duplicate sender_id '{}'",
                    raw.sender_id
                )));
            }
            senders.push(resolve_sender(raw)?);
        }
        Ok(senders)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load every declared catalog/package/sender document and fold the
/// collected Findings into one [`crate::finding::Diagnostic`]; a document
/// that fails to load does not block the others.
pub fn load_schema(
    catalog_paths: &[PathBuf],
    package_paths: &[PathBuf],
    sender_paths: &[PathBuf],
) -> (crate::model::Schema, crate::finding::Diagnostic) {
    let mut loader = Loader::new();
    let mut diagnostic = crate::finding::Diagnostic::new();
    let mut packages = Vec::new();
    let mut senders = Vec::new();

    for path in catalog_paths {
        if let Err(e) = loader.load_catalog_file(path) {
            diagnostic.push(e.into_finding(path));
        }
    }
    for path in package_paths {
        match loader.load_package_file(path) {
            Ok(package) => packages.push(package),
            Err(e) => diagnostic.push(e.into_finding(path)),
        }
    }
    for path in sender_paths {
        match loader.load_sender_file(path) {
            Ok(mut loaded) => senders.append(&mut loaded),
            Err(e) => diagnostic.push(e.into_finding(path)),
        }
    }

    let schema = crate::model::Schema {
        catalogs: loader.into_catalogs(),
        packages,
        senders,
    };
    (schema, diagnostic)
}

// ---------------------------------------------------------------------------
// Raw -> resolved conversions
// ---------------------------------------------------------------------------

fn resolve_catalog(raw: &RawCatalog) -> Result<Catalog, LoaderError> {
    if raw.fields.is_empty() {
        return Err(LoaderError::Structural(format!(
            "catalog '{}' must declare at least one field",
            raw.name
        )));
    }
    let mut seen_names = HashSet::new();
    let mut fields = Vec::with_capacity(raw.fields.len());
    for field in &raw.fields {
        if !seen_names.insert(field.name.clone()) {
            return Err(LoaderError::Structural(format!(
                "duplicate field name '{}' in catalog '{}'",
                field.name, raw.name
            )));
        }
        fields.push(resolve_field(field)?);
    }
    Ok(Catalog {
        name: raw.name.clone(),
        description: raw.description.clone(),
        fields,
        row_validation: raw.row_validation.as_ref().map(resolve_validation).transpose()?,
        catalog_validation: raw
            .catalog_validation
            .as_ref()
            .map(resolve_validation)
            .transpose()?,
        file_format: raw.file_format.as_ref().map(resolve_file_format).transpose()?,
    })
}

fn resolve_field(raw: &RawField) -> Result<FieldSpec, LoaderError> {
    let field_type = match raw.field_type.as_str() {
        "text" => FieldType::Text,
        "number" => FieldType::Number,
        "date" => FieldType::Date,
        "enum" => FieldType::Enum,
        other => {
            return Err(LoaderError::Structural(format!(
                "field '{}' has unsupported type '{other}'",
                raw.name
            )))
        }
    };
    if field_type == FieldType::Enum && raw.allowed_values.as_ref().map_or(true, Vec::is_empty) {
        return Err(LoaderError::Structural(format!(
            "enum field '{}' must declare non-empty allowed_values",
            raw.name
        )));
    }
    if let Some(len) = raw.length {
        if len < 1 {
            return Err(LoaderError::Structural(format!(
                "field '{}' declares length < 1",
                raw.name
            )));
        }
    }
    let mut rules = Vec::with_capacity(raw.rules.len());
    for rule in &raw.rules {
        rules.push(resolve_field_rule(rule)?);
    }
    Ok(FieldSpec {
        name: raw.name.clone(),
        field_type,
        length: raw.length,
        decimals: raw.decimals.unwrap_or(0),
        required: raw.required,
        unique: raw.unique,
        allowed_values: raw.allowed_values.clone(),
        rules,
    })
}

fn resolve_field_rule(raw: &RawFieldRule) -> Result<FieldRule, LoaderError> {
    let expression = expr::parse(&raw.validation_expression)
        .map_err(|e| LoaderError::Expression(raw.message.clone(), e))?;
    Ok(FieldRule {
        validation_expression: expression,
        message: raw.message.clone(),
        severity: parse_severity(raw.severity.as_deref())?,
    })
}

fn resolve_validation(raw: &RawValidation) -> Result<ScopedValidation, LoaderError> {
    let expression = expr::parse(&raw.expression)
        .map_err(|e| LoaderError::Expression(raw.message.clone(), e))?;
    Ok(ScopedValidation {
        expression,
        message: raw.message.clone(),
        severity: parse_severity(raw.severity.as_deref())?,
    })
}

fn resolve_file_format(raw: &RawFileFormat) -> Result<FileFormat, LoaderError> {
    let archive_type = match raw.archive_type.as_deref().unwrap_or("csv") {
        "csv" => ArchiveType::Csv,
        "xlsx" | "xls" => ArchiveType::Xlsx,
        "json" => ArchiveType::Json,
        "xml" => ArchiveType::Xml,
        "zip" => ArchiveType::Zip,
        other => {
            return Err(LoaderError::Structural(format!(
                "unsupported file_format type '{other}'"
            )))
        }
    };
    let separator = match raw.separator.as_deref() {
        None => ',',
        Some(s) if s.chars().count() == 1 => s.chars().next().unwrap(),
        Some(other) => {
            return Err(LoaderError::Structural(format!(
                "file_format separator must be a single character, got '{other}'"
            )))
        }
    };
    Ok(FileFormat {
        archive_type,
        pattern: raw.pattern.clone(),
        encoding: raw.encoding.clone().unwrap_or_else(|| "utf-8".to_owned()),
        separator,
    })
}

fn resolve_destination(raw: raw::RawDestination) -> Result<Destination, LoaderError> {
    let insertion_method = match raw.insertion_method.as_str() {
        "insert" => InsertionMethod::Insert,
        "upsert" => InsertionMethod::Upsert,
        "replace" => InsertionMethod::Replace,
        other => {
            return Err(LoaderError::Structural(format!(
                "unsupported insertion_method '{other}'"
            )))
        }
    };
    let connection = resolve_connection(raw.connection)?;
    let pre_validation = raw.pre_validation.map(|pv| PreValidation {
        endpoint: pv.endpoint,
        method: pv.method,
        payload: pv.payload,
    });
    Ok(Destination {
        enabled: raw.enabled,
        connection,
        target_table: raw.target_table,
        pre_validation,
        insertion_method,
    })
}

fn resolve_connection(raw: RawConnection) -> Result<ConnectionConfig, LoaderError> {
    match raw {
        RawConnection::SecretRef { secret_ref } => Ok(ConnectionConfig::SecretRef(secret_ref)),
        RawConnection::Explicit {
            driver,
            host,
            port,
            user,
            password,
            database,
        } => {
            let driver = match driver.as_str() {
                "postgresql" | "postgres" => Driver::Postgresql,
                "mysql" => Driver::Mysql,
                "sqlserver" | "mssql" => Driver::Sqlserver,
                "oracle" => Driver::Oracle,
                other => {
                    return Err(LoaderError::Structural(format!(
                        "unsupported connection driver '{other}'"
                    )))
                }
            };
            let password = secrets::resolve(&password)?.into_owned();
            Ok(ConnectionConfig::Explicit {
                driver,
                host,
                port,
                user,
                password,
                database,
            })
        }
    }
}

fn resolve_sender(raw: raw::RawSender) -> Result<Sender, LoaderError> {
    let allowed_methods = raw
        .allowed_methods
        .iter()
        .map(|s| parse_channel(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut channel_config = HashMap::new();
    for channel in &allowed_methods {
        let key = channel_key(*channel);
        let cfg = raw.channel_config.get(key).ok_or_else(|| {
            LoaderError::Structural(format!(
                "sender '{}' allows channel '{key}' but declares no channel_config for it",
                raw.sender_id
            ))
        })?;
        channel_config.insert(
            *channel,
            ChannelConfig {
                api_key: cfg.api_key.clone(),
                allowed_senders: cfg.allowed_senders.clone(),
                allowed_hosts: cfg.allowed_hosts.clone(),
            },
        );
    }

    let frequency = match raw.submission_frequency.frequency.as_str() {
        "daily" => Frequency::Daily,
        "weekly" => Frequency::Weekly,
        "monthly" => Frequency::Monthly,
        other => {
            return Err(LoaderError::Structural(format!(
                "unsupported submission frequency '{other}'"
            )))
        }
    };

    Ok(Sender {
        sender_id: raw.sender_id,
        responsible_person: raw.responsible_person,
        allowed_methods,
        channel_config,
        submission_frequency: SubmissionFrequency {
            frequency,
            deadline: raw.submission_frequency.deadline,
        },
        packages: raw.packages,
    })
}

fn parse_channel(s: &str) -> Result<Channel, LoaderError> {
    match s {
        "sftp" => Ok(Channel::Sftp),
        "email" => Ok(Channel::Email),
        "api" => Ok(Channel::Api),
        "filesystem" => Ok(Channel::Filesystem),
        "direct_upload" => Ok(Channel::DirectUpload),
        other => Err(LoaderError::Structural(format!("unsupported channel '{other}'"))),
    }
}

fn channel_key(channel: Channel) -> &'static str {
    match channel {
        Channel::Sftp => "sftp",
        Channel::Email => "email",
        Channel::Api => "api",
        Channel::Filesystem => "filesystem",
        Channel::DirectUpload => "direct_upload",
    }
}

fn parse_severity(raw: Option<&str>) -> Result<Severity, LoaderError> {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        None | Some("ERROR") => Ok(Severity::Error),
        Some("WARNING") => Ok(Severity::Warning),
        Some("INFO") => Ok(Severity::Info),
        Some(other) => Err(LoaderError::Structural(format!("unsupported severity '{other}'"))),
    }
}

/// Walk an [`Expr`] tree collecting every `df['logical_name']` table
/// reference it makes, used to validate a CrossRule only references
/// logical names declared in its own package.
fn collect_table_refs(expr: &Expr) -> HashSet<String> {
    let mut out = HashSet::new();
    walk_table_refs(expr, &mut out);
    out
}

fn walk_table_refs(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::TableColumn { table, .. } => {
            out.insert(table.clone());
        }
        Expr::Unary(_, inner) => walk_table_refs(inner, out),
        Expr::Binary(_, lhs, rhs) => {
            walk_table_refs(lhs, out);
            walk_table_refs(rhs, out);
        }
        Expr::List(items) => items.iter().for_each(|i| walk_table_refs(i, out)),
        Expr::Predicate { receiver, predicate } => {
            walk_table_refs(receiver, out);
            match predicate {
                crate::expr::ColumnPredicate::IsIn(inner)
                | crate::expr::ColumnPredicate::StrContains(inner)
                | crate::expr::ColumnPredicate::StrMatch(inner) => walk_table_refs(inner, out),
                _ => {}
            }
        }
        Expr::Reduce { receiver, .. } => walk_table_refs(receiver, out),
        Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Column(_) | Expr::ShapeRow => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const CATALOG_YAML: &str = r#"
catalog:
  name: ventas
  description: sales lines
  fields:
    - name: customer_id
      type: text
      required: true
      unique: true
    - name: total
      type: number
  row_validation:
    expression: "total > 0"
    message: "total must be positive"
    severity: ERROR
"#;

    #[test]
    fn loads_a_standalone_catalog() {
        let mut loader = Loader::new();
        let catalog = loader.load_catalog_str(CATALOG_YAML, Path::new("ventas.yaml")).unwrap();
        assert_eq!(catalog.name, "ventas");
        assert_eq!(catalog.fields.len(), 2);
        assert!(catalog.row_validation.is_some());
    }

    #[test]
    fn rejects_enum_without_allowed_values() {
        let yaml = r#"
catalog:
  name: bad
  fields:
    - name: status
      type: enum
"#;
        let loader = Loader::new();
        let err = loader.load_catalog_str(yaml, Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, LoaderError::Structural(_)));
    }

    #[test]
    fn rejects_duplicate_field_names() {
        let yaml = r#"
catalog:
  name: dup
  fields:
    - name: a
      type: text
    - name: a
      type: number
"#;
        let loader = Loader::new();
        let err = loader.load_catalog_str(yaml, Path::new("dup.yaml")).unwrap_err();
        assert!(matches!(err, LoaderError::Structural(_)));
    }

    #[test]
    fn package_with_path_reference_resolves_relative_to_document() {
        let dir = tempfile::tempdir().unwrap();
        write_temp(&dir, "ventas.yaml", CATALOG_YAML);
        let package_yaml = r#"
package:
  name: ventas_pkg
  file_format:
    type: zip
    pattern: "{sender_id}_{date}.zip"
  catalogs:
    - logical_name: ventas
      path: ./ventas.yaml
      file_inside_archive: ventas.csv
  destination:
    enabled: true
    connection:
      secret_ref: DB_URL
    target_table: ventas
    insertion_method: insert
"#;
        let package_path = write_temp(&dir, "package.yaml", package_yaml);
        let mut loader = Loader::new();
        let package = loader.load_package_file(&package_path).unwrap();
        assert_eq!(package.catalogs.len(), 1);
        assert_eq!(package.catalogs[0].logical_name, "ventas");
        let catalogs = loader.into_catalogs();
        assert_eq!(catalogs.len(), 1);
        assert_eq!(catalogs[0].name, "ventas");
    }

    #[test]
    fn cross_rule_referencing_undeclared_logical_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_temp(&dir, "ventas.yaml", CATALOG_YAML);
        let package_yaml = r#"
package:
  name: ventas_pkg
  file_format:
    type: zip
    pattern: "{sender_id}_{date}.zip"
  catalogs:
    - logical_name: ventas
      path: ./ventas.yaml
  cross_rules:
    - name: bogus
      validation_expression: "df['missing']['x'].notnull()"
      message: "..."
  destination:
    enabled: true
    connection:
      secret_ref: DB_URL
    target_table: ventas
    insertion_method: insert
"#;
        let package_path = write_temp(&dir, "package.yaml", package_yaml);
        let mut loader = Loader::new();
        let err = loader.load_package_file(&package_path).unwrap_err();
        assert!(matches!(err, LoaderError::Structural(_)));
    }

    #[test]
    fn sender_document_requires_channel_config_for_every_allowed_method() {
        let yaml = r#"
senders_list:
  - sender_id: TEST001
    responsible_person: Ana
    allowed_methods: [sftp]
    submission_frequency:
      frequency: daily
      deadline: "23:59"
    packages: [ventas_pkg]
"#;
        let loader = Loader::new();
        let err = loader.load_sender_str(yaml, Path::new("senders.yaml")).unwrap_err();
        assert!(matches!(err, LoaderError::Structural(_)));
    }

    #[test]
    fn sender_document_loads_with_full_channel_config() {
        let yaml = r#"
senders_list:
  - sender_id: TEST001
    responsible_person: Ana
    allowed_methods: [sftp, email]
    channel_config:
      sftp:
        allowed_hosts: ["10.0.0.1"]
      email:
        allowed_senders: ["ana@example.com"]
    submission_frequency:
      frequency: daily
      deadline: "23:59"
    packages: [ventas_pkg]
"#;
        let loader = Loader::new();
        let senders = loader.load_sender_str(yaml, Path::new("senders.yaml")).unwrap();
        assert_eq!(senders.len(), 1);
        assert_eq!(senders[0].sender_id, "TEST001");
    }
}
