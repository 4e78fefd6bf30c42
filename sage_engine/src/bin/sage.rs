//! `sage` — the command-line surface over `sage_engine`'s Validation API:
//! `validate-yaml`, `process-package`, `validate-sender`.
//!
//! Exit codes: `0` success, `1` any ERROR Finding, `2` usage/IO error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sage_engine::finding::{Diagnostic, DiagnosticStatus, Finding};
use sage_engine::model::{Channel, Submission};

#[derive(Parser, Debug)]
#[command(name = "sage", about = "Declarative data-ingestion and validation engine")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Emit the Diagnostic as pretty JSON instead of a human-readable list.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (`-v` info, `-vv` debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Structurally validate one configuration document.
    ValidateYaml {
        path: PathBuf,
        /// One of catalog, package, sender.
        kind: DocumentKind,
    },
    /// Run the Validator end-to-end over an archive, without the Sink.
    /// `--sender-id` fills the `{sender_id}` filename placeholder when
    /// the package's file_format pattern needs one.
    ProcessPackage {
        archive_path: PathBuf,
        package_doc: PathBuf,
        #[arg(long, default_value = "")]
        sender_id: String,
    },
    /// Check Sender Gate authorization only, without reading any file.
    ValidateSender {
        sender_doc: PathBuf,
        package_name: String,
        #[arg(long)]
        sender_id: String,
        #[arg(long, default_value = "filesystem")]
        channel: String,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DocumentKind {
    Catalog,
    Package,
    Sender,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match args.command {
        Command::ValidateYaml { path, kind } => validate_yaml(&path, kind),
        Command::ProcessPackage {
            archive_path,
            package_doc,
            sender_id,
        } => process_package(&archive_path, &package_doc, &sender_id),
        Command::ValidateSender {
            sender_doc,
            package_name,
            sender_id,
            channel,
        } => validate_sender(&sender_doc, &package_name, &sender_id, &channel),
    };

    match result {
        Ok(diagnostic) => {
            emit(&diagnostic, args.json);
            exit_for(diagnostic.status())
        }
        Err(usage_error) => {
            log::error!("{usage_error}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn exit_for(status: DiagnosticStatus) -> ExitCode {
    match status {
        DiagnosticStatus::Success | DiagnosticStatus::Warning => ExitCode::from(0),
        DiagnosticStatus::Error => ExitCode::from(1),
    }
}

fn emit(diagnostic: &Diagnostic, as_json: bool) {
    if as_json {
        match diagnostic.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => log::error!("failed to serialize diagnostic: {e}"),
        }
        return;
    }
    if diagnostic.findings.is_empty() {
        println!("OK — no findings");
        return;
    }
    for finding in &diagnostic.findings {
        println!("{}", format_finding(finding));
    }
    println!("\n{} finding(s), status = {:?}", diagnostic.findings.len(), diagnostic.status());
}

fn format_finding(finding: &Finding) -> String {
    let mut parts = vec![format!("[{}]", finding.severity)];
    parts.push(format!("{}", finding.scope));
    if let Some(catalog) = &finding.locator.catalog {
        parts.push(catalog.clone());
    }
    if let Some(field) = &finding.locator.field {
        parts.push(field.clone());
    }
    if let Some(row) = finding.locator.row_index {
        parts.push(format!("row {row}"));
    }
    format!("{} — {}", parts.join(" "), finding.message)
}

fn validate_yaml(path: &PathBuf, kind: DocumentKind) -> Result<Diagnostic, String> {
    let mut loader = sage_engine::loader::Loader::new();
    let mut diagnostic = Diagnostic::new();
    let outcome = match kind {
        DocumentKind::Catalog => loader.load_catalog_file(path).map(|_| ()),
        DocumentKind::Package => loader.load_package_file(path).map(|_| ()),
        DocumentKind::Sender => loader.load_sender_file(path).map(|_| ()),
    };
    if let Err(e) = outcome {
        if let sage_engine::loader::LoaderError::Io(_, _) = &e {
            return Err(e.to_string());
        }
        diagnostic.push(e.into_finding(path));
    }
    Ok(diagnostic)
}

fn process_package(archive_path: &PathBuf, package_doc: &PathBuf, sender_id: &str) -> Result<Diagnostic, String> {
    let mut diagnostic = Diagnostic::new();
    let mut loader = sage_engine::loader::Loader::new();
    let package = match loader.load_package_file(package_doc) {
        Ok(p) => p,
        Err(e @ sage_engine::loader::LoaderError::Io(_, _)) => return Err(e.to_string()),
        Err(e) => {
            diagnostic.push(e.into_finding(package_doc));
            return Ok(diagnostic);
        }
    };
    let schema = sage_engine::model::Schema {
        catalogs: loader.into_catalogs(),
        packages: vec![package.clone()],
        senders: Vec::new(),
    };

    let blob = std::fs::read(archive_path).map_err(|e| format!("could not read '{}': {e}", archive_path.display()))?;
    let filename = archive_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| format!("'{}' has no file name component", archive_path.display()))?;

    let (tables, read_diagnostic) = sage_engine::reader::read_package(&schema, &package, &blob, &filename, sender_id);
    diagnostic.merge(read_diagnostic);
    if diagnostic.has_errors() {
        return Ok(diagnostic);
    }
    diagnostic.merge(sage_engine::validator::run(&schema, &package, &tables));
    Ok(diagnostic)
}

fn validate_sender(sender_doc: &PathBuf, package_name: &str, sender_id: &str, channel: &str) -> Result<Diagnostic, String> {
    let mut loader = sage_engine::loader::Loader::new();
    let senders = match loader.load_sender_file(sender_doc) {
        Ok(s) => s,
        Err(e @ sage_engine::loader::LoaderError::Io(_, _)) => return Err(e.to_string()),
        Err(e) => {
            let mut diagnostic = Diagnostic::new();
            diagnostic.push(e.into_finding(sender_doc));
            return Ok(diagnostic);
        }
    };
    let schema = sage_engine::model::Schema {
        catalogs: Vec::new(),
        packages: Vec::new(),
        senders,
    };

    let channel = parse_channel(channel)?;
    let submission = Submission {
        sender_id: sender_id.to_owned(),
        package_name: package_name.to_owned(),
        channel,
        blob: Vec::new(),
        filename: String::new(),
        receipt_time: chrono::Utc::now(),
        channel_credential: None,
    };

    let mut diagnostic = Diagnostic::new();
    match sage_engine::gate::check(&schema, &submission) {
        Ok(gate_diagnostic) => diagnostic.merge(gate_diagnostic),
        Err(terminal) => diagnostic.push(terminal),
    }
    Ok(diagnostic)
}

fn parse_channel(s: &str) -> Result<Channel, String> {
    match s {
        "sftp" => Ok(Channel::Sftp),
        "email" => Ok(Channel::Email),
        "api" => Ok(Channel::Api),
        "filesystem" => Ok(Channel::Filesystem),
        "direct_upload" => Ok(Channel::DirectUpload),
        other => Err(format!("unsupported channel '{other}'")),
    }
}
