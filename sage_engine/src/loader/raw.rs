//! Permissive "raw" document shapes deserialized directly from YAML.
//!
//! Mirrors the teacher's `TomlCheckSection`/`TomlCacheSection` pattern:
//! every field is optional or loosely typed here, with defaulting and
//! validation happening in `resolve` once the whole document tree is
//! available. Nothing in this module can fail to deserialize a
//! syntactically valid YAML document — mismatches between the declared
//! shape and the spec's constraints surface later, as Findings.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawCatalogDocument {
    pub catalog: RawCatalog,
}

#[derive(Debug, Deserialize)]
pub struct RawCatalog {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<RawField>,
    pub row_validation: Option<RawValidation>,
    pub catalog_validation: Option<RawValidation>,
    pub file_format: Option<RawFileFormat>,
}

#[derive(Debug, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub length: Option<u32>,
    pub decimals: Option<u32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub rules: Vec<RawFieldRule>,
}

#[derive(Debug, Deserialize)]
pub struct RawFieldRule {
    pub validation_expression: String,
    pub message: String,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawValidation {
    pub expression: String,
    pub message: String,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawFileFormat {
    #[serde(rename = "type")]
    pub archive_type: Option<String>,
    pub pattern: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub separator: Option<String>,
}

// ---------------------------------------------------------------------------
// Package document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawPackageDocument {
    pub package: RawPackage,
}

#[derive(Debug, Deserialize)]
pub struct RawPackage {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
    pub file_format: RawFileFormat,
    pub catalogs: Vec<RawCatalogRef>,
    #[serde(default)]
    pub cross_rules: Vec<RawCrossRule>,
    pub destination: RawDestination,
}

#[derive(Debug, Deserialize)]
pub struct RawCatalogRef {
    pub logical_name: String,
    pub file_inside_archive: Option<String>,
    /// By-path reference, relative to this package document.
    pub path: Option<String>,
    /// Inline catalog, equivalent to a `path:` reference per Open
    /// Question (b) — both resolve to the same in-memory `Catalog`.
    pub components: Option<RawCatalog>,
    pub file_format_override: Option<RawFileFormat>,
}

#[derive(Debug, Deserialize)]
pub struct RawCrossRule {
    pub name: String,
    pub validation_expression: String,
    #[serde(default)]
    pub severity: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RawDestination {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub connection: RawConnection,
    pub target_table: String,
    pub pre_validation: Option<RawPreValidation>,
    pub insertion_method: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawConnection {
    SecretRef { secret_ref: String },
    Explicit {
        driver: String,
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct RawPreValidation {
    pub endpoint: String,
    #[serde(default = "default_post")]
    pub method: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_post() -> String {
    "POST".to_owned()
}

// ---------------------------------------------------------------------------
// Sender document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawSenderDocument {
    pub senders_list: Vec<RawSender>,
}

#[derive(Debug, Deserialize)]
pub struct RawSender {
    pub sender_id: String,
    pub responsible_person: String,
    pub allowed_methods: Vec<String>,
    #[serde(default)]
    pub channel_config: HashMap<String, RawChannelConfig>,
    pub submission_frequency: RawSubmissionFrequency,
    #[serde(default)]
    pub packages: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawChannelConfig {
    pub api_key: Option<String>,
    #[serde(default)]
    pub allowed_senders: Vec<String>,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawSubmissionFrequency {
    pub frequency: String,
    pub deadline: String,
}
