//! ScopeGuard command line.
//!
//! ```bash
//! # Seed the approved baseline
//! scopeguard baseline import approved.json --db baseline.db
//!
//! # Check one or more bulletins against it
//! scopeguard scan Bulletin_04.json --project P-001 --db baseline.db --persist
//!
//! # Draft the RFI for one detected conflict
//! scopeguard rfi --conflicts conflicts.json --id <uuid> --context rfi.json
//!
//! # Validate a reference-table directory
//! scopeguard tables check ./config
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::db::{self, DatabaseError};
use crate::intelligence::{RfiContext, RfiDrafter};
use crate::models::{BaselineRecord, Conflict, Document, Page};
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::crossref::SqliteBaselineStore;
use crate::pipeline::progress::{ProgressEvent, ProgressSink};
use crate::pipeline::{DocumentPipeline, DocumentReport, IngestJob, IngestionManager};
use crate::reference::{ReferenceError, ReferenceTables};

#[derive(Parser, Debug)]
#[command(name = "scopeguard")]
#[command(version, about = "Detect bulletins that contradict approved elevator submittals")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the conflict pipeline over revision documents
    Scan(ScanArgs),

    /// Manage the approved baseline
    #[command(subcommand)]
    Baseline(BaselineCommand),

    /// Draft an RFI for one detected conflict
    Rfi(RfiArgs),

    /// Reference table utilities
    #[command(subcommand)]
    Tables(TablesCommand),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Document JSON files (pages of OCR tokens)
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,

    /// Project whose baseline applies
    #[arg(short, long, env = "SCOPEGUARD_PROJECT")]
    pub project: String,

    /// Reference table directory (bundled tables when omitted)
    #[arg(short, long, env = "SCOPEGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Baseline database (defaults to ~/ScopeGuard/baseline.db)
    #[arg(long, env = "SCOPEGUARD_DB")]
    pub db: Option<PathBuf>,

    /// Save detected conflicts to the database
    #[arg(long)]
    pub persist: bool,

    /// Also write every conflict, flattened, to this file
    #[arg(long)]
    pub conflicts_out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum BaselineCommand {
    /// Import approved records from a JSON array
    Import {
        file: PathBuf,

        #[arg(long, env = "SCOPEGUARD_DB")]
        db: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct RfiArgs {
    /// Conflicts JSON written by `scan --conflicts-out`
    #[arg(long)]
    pub conflicts: PathBuf,

    /// Conflict id to draft for
    #[arg(long)]
    pub id: Uuid,

    /// RFI context JSON (project, bulletin, recipient, sender)
    #[arg(long)]
    pub context: PathBuf,

    #[arg(short, long, env = "SCOPEGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Drafting date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum TablesCommand {
    /// Load and validate every table in a directory
    Check { dir: PathBuf },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid JSON in {path}: {reason}")]
    Json { path: String, reason: String },

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conflict {0} not found")]
    ConflictNotFound(Uuid),

    #[error("{failed} of {total} documents failed")]
    DocumentsFailed { failed: usize, total: usize },
}

/// Document file as produced by the OCR step. The id is assigned here.
#[derive(Debug, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    source_filename: Option<String>,
    pages: Vec<Page>,
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    serde_json::from_str(&read_file(path)?).map_err(|e| CliError::Json {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|e| CliError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn load_document(path: &Path) -> Result<Document, CliError> {
    let file: DocumentFile = read_json(path)?;
    let byte_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let filename = file.source_filename.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    });
    Ok(Document::new(filename, byte_size, file.pages))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub async fn execute(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Commands::Scan(args) => {
            let reports = scan(&args).await?;
            let failed = reports.iter().filter(|r| r.is_none()).count();
            if failed > 0 {
                return Err(CliError::DocumentsFailed {
                    failed,
                    total: reports.len(),
                });
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Baseline(BaselineCommand::Import { file, db }) => {
            let db = db.unwrap_or_else(config::baseline_db_path);
            let count = import_baseline(&file, &db)?;
            println!("Imported {count} baseline records into {}", db.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rfi(args) => {
            let today = args.today.unwrap_or_else(|| Local::now().date_naive());
            let draft = draft_rfi(&args, today)?;
            println!("{draft}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tables(TablesCommand::Check { dir }) => {
            let tables = ReferenceTables::load(&dir)?;
            println!(
                "OK: vocabulary {} ({} categories), {} scope keywords, {} cost rules",
                tables.vocabulary.version(),
                tables.vocabulary.categories().len(),
                tables.scope_keywords.keywords.len(),
                tables.cost_rules.rules.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Runs the pipeline and prints reports as JSON. Failed documents are
/// reported on stderr and come back as `None`.
pub async fn scan(args: &ScanArgs) -> Result<Vec<Option<DocumentReport>>, CliError> {
    let tables = Arc::new(ReferenceTables::load_or_bundled(args.config.as_deref())?);
    let db_path = args.db.clone().unwrap_or_else(config::baseline_db_path);
    let max_concurrent = tables.settings.max_concurrent_documents;

    let jobs = args
        .documents
        .iter()
        .map(|path| load_document(path).map(|doc| IngestJob::new(doc, args.project.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    let names: HashMap<Uuid, String> = jobs
        .iter()
        .map(|j| (j.document.id, j.document.source_filename.clone()))
        .collect();

    let pipeline = DocumentPipeline::new(tables, Arc::new(SqliteBaselineStore::new(&db_path)));
    let cancel = CancellationToken::new();
    let manager = IngestionManager::new(Arc::new(pipeline), max_concurrent)
        .with_cancellation(cancel.clone());

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling at next stage boundary");
            cancel.cancel();
        }
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let name = names
                .get(&event.document_id)
                .map(String::as_str)
                .unwrap_or("?");
            eprintln!("{name}: {}", event.label());
        }
    });

    let sink: Arc<dyn ProgressSink> = Arc::new(tx);
    let results = manager.process_all(jobs, sink).await;
    interrupt.abort();
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "Progress printer stopped");
    }

    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(report) => reports.push(Some(report)),
            Err(failure) => {
                eprintln!("error: {failure}");
                reports.push(None);
            }
        }
    }

    let succeeded: Vec<&DocumentReport> = reports.iter().flatten().collect();
    println!("{}", serde_json::to_string_pretty(&succeeded)?);

    if let Some(path) = &args.conflicts_out {
        let all: Vec<&Conflict> = succeeded.iter().flat_map(|r| &r.conflicts).collect();
        write_file(path, &serde_json::to_string_pretty(&all)?)?;
    }

    if args.persist {
        let conn = db::open_database(&db_path)?;
        for report in &succeeded {
            db::save_conflicts(&conn, &report.project_id, &report.document_id, &report.conflicts)?;
            tracing::info!(
                document_id = %report.document_id,
                conflicts = report.conflicts.len(),
                "Conflicts persisted"
            );
        }
    }

    Ok(reports)
}

pub fn import_baseline(file: &Path, db_path: &Path) -> Result<usize, CliError> {
    let records: Vec<BaselineRecord> = read_json(file)?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CliError::Io {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    let conn = db::open_database(db_path)?;
    let count = db::import_baseline_records(&conn, &records)?;
    tracing::info!(count, db = %db_path.display(), "Baseline imported");
    Ok(count)
}

/// Renders the RFI as clipboard text.
pub fn draft_rfi(args: &RfiArgs, today: NaiveDate) -> Result<String, CliError> {
    let tables = ReferenceTables::load_or_bundled(args.config.as_deref())?;
    let conflicts: Vec<Conflict> = read_json(&args.conflicts)?;
    let context: RfiContext = read_json(&args.context)?;

    let conflict = conflicts
        .iter()
        .find(|c| c.id == args.id)
        .ok_or(CliError::ConflictNotFound(args.id))?;

    let drafter = RfiDrafter::new(Arc::new(tables.vocabulary));
    let draft = drafter.draft(conflict, &context, today);
    tracing::info!(
        conflict_id = %conflict.id,
        respond_by = %draft.respond_by,
        "RFI drafted"
    );
    Ok(draft.to_clipboard_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Severity;
    use serde_json::json;

    fn write_json(dir: &Path, name: &str, value: serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        path
    }

    fn baseline_json() -> serde_json::Value {
        json!([{
            "id": "8f14e45f-ceea-467f-a0e6-6a8d1f3e4b2a",
            "project_id": "P-001",
            "submittal_id": "Submittal #14",
            "approved_on": "2024-08-15",
            "category": "ELECTRICAL_SCOPE",
            "location": "Pit 2 (Service Car)",
            "attributes": {"voltage": "120V", "phase": "1-Phase", "frequency": "60Hz"}
        }])
    }

    fn bulletin_json() -> serde_json::Value {
        json!({
            "source_filename": "Bulletin_04.pdf",
            "pages": [{
                "sheet_code": "E-501",
                "discipline": "electrical",
                "tokens": [
                    {"text": "Pit 2 (Service Car)"},
                    {"text": "208V"},
                    {"text": "3-Phase"}
                ]
            }]
        })
    }

    #[test]
    fn cli_parses_scan() {
        let cli = Cli::try_parse_from([
            "scopeguard",
            "scan",
            "a.json",
            "b.json",
            "--project",
            "P-001",
            "--persist",
        ])
        .unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.documents.len(), 2);
                assert_eq!(args.project, "P-001");
                assert!(args.persist);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_requires_documents() {
        assert!(Cli::try_parse_from(["scopeguard", "scan", "--project", "P-001"]).is_err());
    }

    #[test]
    fn load_document_defaults_filename_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(dir.path(), "ASI_07.json", json!({"pages": []}));
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.source_filename, "ASI_07.json");
        assert!(doc.byte_size > 0);
    }

    #[test]
    fn import_then_scan_detects_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("baseline.db");
        let baseline = write_json(dir.path(), "approved.json", baseline_json());
        assert_eq!(import_baseline(&baseline, &db_path).unwrap(), 1);

        let doc = write_json(dir.path(), "bulletin.json", bulletin_json());
        let out = dir.path().join("conflicts.json");
        let args = ScanArgs {
            documents: vec![doc],
            project: "P-001".into(),
            config: None,
            db: Some(db_path.clone()),
            persist: true,
            conflicts_out: Some(out.clone()),
        };

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let reports = runtime.block_on(scan(&args)).unwrap();
        let report = reports[0].as_ref().unwrap();
        assert_eq!(report.highest_severity(), Some(Severity::Critical));

        let written: Vec<Conflict> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written, report.conflicts);

        let conn = db::open_database(&db_path).unwrap();
        let stored = db::load_conflicts(&conn, &report.document_id).unwrap();
        assert_eq!(stored, report.conflicts);
    }

    #[test]
    fn missing_baseline_db_fails_document_not_command() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_json(dir.path(), "bulletin.json", bulletin_json());
        let config_dir = dir.path().join("config");
        std::fs::create_dir(&config_dir).unwrap();
        for (name, contents) in [
            ("vocabulary.json", include_str!("../resources/config/vocabulary.json")),
            ("scope_keywords.json", include_str!("../resources/config/scope_keywords.json")),
            ("severity_weights.json", include_str!("../resources/config/severity_weights.json")),
            ("cost_rules.json", include_str!("../resources/config/cost_rules.json")),
        ] {
            std::fs::write(config_dir.join(name), contents).unwrap();
        }
        // Fast retries keep the test short.
        write_json(
            &config_dir,
            "pipeline.json",
            json!({"retry": {"max_attempts": 2, "initial_delay_ms": 1, "max_delay_ms": 2}}),
        );

        let args = ScanArgs {
            documents: vec![doc],
            project: "P-001".into(),
            config: Some(config_dir),
            db: Some(dir.path().join("absent.db")),
            persist: false,
            conflicts_out: None,
        };
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let reports = runtime.block_on(scan(&args)).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_none());
    }

    #[test]
    fn rfi_for_unknown_conflict_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let conflicts = write_json(dir.path(), "conflicts.json", json!([]));
        let context = write_json(
            dir.path(),
            "rfi.json",
            json!({
                "project_name": "Skyline Tower",
                "bulletin_id": "Bulletin 04",
                "recipient": {"name": "John Miller", "email": "jmiller@turner.com"},
                "sender_name": "Alex Rivera",
                "sender_title": "Project Manager"
            }),
        );
        let args = RfiArgs {
            conflicts,
            id: Uuid::nil(),
            context,
            config: None,
            today: None,
        };
        let today = NaiveDate::from_ymd_opt(2024, 11, 4).unwrap();
        assert!(matches!(
            draft_rfi(&args, today),
            Err(CliError::ConflictNotFound(_))
        ));
    }

    #[test]
    fn tables_check_accepts_bundled_copies() {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in [
            ("vocabulary.json", include_str!("../resources/config/vocabulary.json")),
            ("scope_keywords.json", include_str!("../resources/config/scope_keywords.json")),
            ("severity_weights.json", include_str!("../resources/config/severity_weights.json")),
            ("cost_rules.json", include_str!("../resources/config/cost_rules.json")),
        ] {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        assert!(ReferenceTables::load(dir.path()).is_ok());
    }
}
