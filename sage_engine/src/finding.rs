//! The Finding/Diagnostic vocabulary shared by every scope of the engine.
//!
//! `Scope` names the six places a Finding can be anchored: field, row,
//! catalog, package, file, authorization.

use serde::{Deserialize, Serialize};

/// Severity of a single [`Finding`].
///
/// Ordered so that `Error < Warning < Info` is false and sorting a
/// `Vec<Finding>` by severity puts the most urgent entries first when
/// combined with `Reverse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed; blocks the Sink from running.
    Error,
    /// Should be addressed but does not block.
    Warning,
    /// Informational notice, no action required.
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// Where in the validation pipeline a [`Finding`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Field,
    Row,
    Catalog,
    Package,
    File,
    Authorization,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field => write!(f, "field"),
            Self::Row => write!(f, "row"),
            Self::Catalog => write!(f, "catalog"),
            Self::Package => write!(f, "package"),
            Self::File => write!(f, "file"),
            Self::Authorization => write!(f, "authorization"),
        }
    }
}

/// A locator pinpointing where a [`Finding`] applies.
///
/// All fields are optional because a locator's precision depends on the
/// scope: a field-scope finding carries a field name and usually a row
/// index; a package-scope cross-rule finding carries only a catalog name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// 1-based row index, matching the Reader's addressing convention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
}

impl Locator {
    pub fn catalog(name: impl Into<String>) -> Self {
        Self {
            catalog: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn field(catalog: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            catalog: Some(catalog.into()),
            field: Some(field.into()),
            ..Default::default()
        }
    }

    pub fn row(catalog: impl Into<String>, field: impl Into<String>, row_index: usize) -> Self {
        Self {
            catalog: Some(catalog.into()),
            field: Some(field.into()),
            row_index: Some(row_index),
        }
    }
}

/// One diagnostic entry: severity, scope, locator, message, and the value
/// that triggered it (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub scope: Scope,
    pub locator: Locator,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, scope: Scope, locator: Locator, message: impl Into<String>) -> Self {
        Self {
            severity,
            scope,
            locator,
            message: message.into(),
            observed_value: None,
            rule_name: None,
        }
    }

    #[must_use]
    pub fn with_observed_value(mut self, value: impl Into<String>) -> Self {
        self.observed_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_rule_name(mut self, name: impl Into<String>) -> Self {
        self.rule_name = Some(name.into());
        self
    }
}

/// Overall status of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticStatus {
    Success,
    Warning,
    Error,
}

/// The ordered list of [`Finding`]s produced by one validation pass.
///
/// Findings are appended in evaluation order (scope order outer,
/// declaration order inner, row order innermost) and never re-sorted —
/// upholding that order while appending is the caller's (the
/// Validator's) responsibility, not something this type enforces after
/// the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub findings: Vec<Finding>,
}

impl Diagnostic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Finding>) {
        self.findings.extend(other);
    }

    pub fn merge(&mut self, mut other: Diagnostic) {
        self.findings.append(&mut other.findings);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    #[must_use]
    pub fn has_errors_in_catalog(&self, catalog: &str) -> bool {
        self.findings.iter().any(|f| {
            f.severity == Severity::Error && f.locator.catalog.as_deref() == Some(catalog)
        })
    }

    #[must_use]
    pub fn status(&self) -> DiagnosticStatus {
        if self.has_errors() {
            DiagnosticStatus::Error
        } else if self
            .findings
            .iter()
            .any(|f| f.severity == Severity::Warning)
        {
            DiagnosticStatus::Warning
        } else {
            DiagnosticStatus::Success
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_success_when_empty() {
        let diag = Diagnostic::new();
        assert_eq!(diag.status(), DiagnosticStatus::Success);
    }

    #[test]
    fn status_warning_when_only_warnings() {
        let mut diag = Diagnostic::new();
        diag.push(Finding::new(
            Severity::Warning,
            Scope::Field,
            Locator::field("sales", "total"),
            "too long",
        ));
        assert_eq!(diag.status(), DiagnosticStatus::Warning);
    }

    #[test]
    fn status_error_when_any_error_present() {
        let mut diag = Diagnostic::new();
        diag.push(Finding::new(
            Severity::Warning,
            Scope::Field,
            Locator::field("sales", "total"),
            "too long",
        ));
        diag.push(Finding::new(
            Severity::Error,
            Scope::Row,
            Locator::catalog("sales"),
            "bad row",
        ));
        assert_eq!(diag.status(), DiagnosticStatus::Error);
    }

    #[test]
    fn has_errors_in_catalog_is_scoped() {
        let mut diag = Diagnostic::new();
        diag.push(Finding::new(
            Severity::Error,
            Scope::Catalog,
            Locator::catalog("ventas"),
            "boom",
        ));
        assert!(diag.has_errors_in_catalog("ventas"));
        assert!(!diag.has_errors_in_catalog("clientes"));
    }
}
