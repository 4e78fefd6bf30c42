//! Run Controller: the public façade combining Gate → Reader → Validator
//! → (optionally) Sink into three entry points, `load`/`validate`/`process`.
//!
//! Owns no threads itself — callers supply concurrency, whether that's
//! the CLI processing one submission at a time or an async HTTP adapter
//! running many `process` calls concurrently across a `tokio` runtime.

use std::path::PathBuf;
use std::time::Duration;

use crate::finding::{Diagnostic, Finding, Scope, Severity};
use crate::model::{Package, Schema, Submission};
use crate::{gate, reader, sink, validator};

/// Parse and structurally validate catalog/package/sender documents into
/// a [`Schema`].
#[must_use]
pub fn load(catalog_paths: &[PathBuf], package_paths: &[PathBuf], sender_paths: &[PathBuf]) -> (Schema, Diagnostic) {
    crate::loader::load_schema(catalog_paths, package_paths, sender_paths)
}

/// The outcome of `process`/`validate`: a normal [`Diagnostic`], or a
/// distinct `Cancelled` outcome when the submission's deadline is
/// exceeded mid-flight — a cancelled run has no Diagnostic at all, by
/// design.
#[derive(Debug)]
pub enum Outcome {
    Diagnosed(Diagnostic),
    Cancelled,
}

impl Outcome {
    #[must_use]
    pub fn diagnostic(self) -> Option<Diagnostic> {
        match self {
            Outcome::Diagnosed(d) => Some(d),
            Outcome::Cancelled => None,
        }
    }
}

/// Runs Gate, Reader and Validator against one submission, without the
/// Sink. Synchronous — all three phases are CPU-bound.
#[must_use]
pub fn validate(schema: &Schema, submission: &Submission) -> Diagnostic {
    let mut diagnostic = Diagnostic::new();

    let package = match schema.package_by_name(&submission.package_name) {
        Some(p) => p,
        None => {
            diagnostic.push(Finding::new(
                Severity::Error,
                Scope::File,
                crate::finding::Locator::default(),
                format!("package '{}' is not declared in the loaded Schema", submission.package_name),
            ));
            return diagnostic;
        }
    };

    match gate::check(schema, submission) {
        Err(terminal) => {
            diagnostic.push(terminal);
            return diagnostic;
        }
        Ok(gate_findings) => diagnostic.merge(gate_findings),
    }

    run_reader_and_validator(schema, package, submission, &mut diagnostic);
    diagnostic
}

fn run_reader_and_validator(
    schema: &Schema,
    package: &Package,
    submission: &Submission,
    diagnostic: &mut Diagnostic,
) -> Option<std::collections::HashMap<String, crate::model::Table>> {
    let (tables, read_diagnostic) = reader::read_package(
        schema,
        package,
        &submission.blob,
        &submission.filename,
        &submission.sender_id,
    );
    diagnostic.merge(read_diagnostic);
    if diagnostic.has_errors() {
        return None;
    }

    diagnostic.merge(validator::run(schema, package, &tables));
    Some(tables)
}

/// As `validate`, and on a clean Diagnostic applies the Sink. The
/// submission's `deadline` (if any) bounds the Sink's transaction and any
/// `pre_validation` call; exceeding it yields [`Outcome::Cancelled`]
/// rather than a Diagnostic.
pub async fn process(schema: &Schema, submission: &Submission, deadline: Option<Duration>) -> Outcome {
    let mut diagnostic = Diagnostic::new();

    let package = match schema.package_by_name(&submission.package_name) {
        Some(p) => p,
        None => {
            diagnostic.push(Finding::new(
                Severity::Error,
                Scope::File,
                crate::finding::Locator::default(),
                format!("package '{}' is not declared in the loaded Schema", submission.package_name),
            ));
            return Outcome::Diagnosed(diagnostic);
        }
    };

    match gate::check(schema, submission) {
        Err(terminal) => {
            diagnostic.push(terminal);
            return Outcome::Diagnosed(diagnostic);
        }
        Ok(gate_findings) => diagnostic.merge(gate_findings),
    }

    let Some(tables) = run_reader_and_validator(schema, package, submission, &mut diagnostic) else {
        return Outcome::Diagnosed(diagnostic);
    };

    if diagnostic.has_errors() {
        return Outcome::Diagnosed(diagnostic);
    }

    let sink_call = sink::apply(schema, package, &tables, &submission_id(submission), deadline);
    let sink_result = match deadline {
        Some(d) => match tokio::time::timeout(d, sink_call).await {
            Ok(result) => result,
            Err(_) => return Outcome::Cancelled,
        },
        None => sink_call.await,
    };

    if let Err(finding) = sink_result {
        diagnostic.push(finding);
    }

    Outcome::Diagnosed(diagnostic)
}

/// A stable-enough identifier for a submission's scratch table scoping:
/// sender + package + receipt time, since `Submission` is an ephemeral
/// value with no separately-assigned id of its own.
fn submission_id(submission: &Submission) -> String {
    format!(
        "{}_{}_{}",
        submission.sender_id,
        submission.package_name,
        submission.receipt_time.timestamp()
    )
}
