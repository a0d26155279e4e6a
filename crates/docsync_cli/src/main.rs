//! # docsync CLI
//!
//! Thin command-line front end over `docsync_core`: seed a schema catalog,
//! create per-project documents and apply partial content updates against a
//! local SQLite file.
//!
//! ```bash
//! docsync --db ./docsync.sqlite3 seed ./catalog.toml
//! docsync add-project --title Acme
//! docsync create <project-id> business-plan
//! docsync update <project-id> business-plan --item "summary=Our mission..."
//! ```
//!
//! Every command prints pretty JSON on stdout.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use docsync_core::db::open_db;
use docsync_core::{
    init_logging_from_config, load_catalog_seed, load_config, AppConfig, CatalogCache,
    ContentItem, DocumentContent, DocumentRepository, DocumentService, DocumentTypeRef,
    SchemaCatalog, SqliteCatalogRepository, SqliteDocumentRepository,
};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

type Service<'conn> =
    DocumentService<SqliteCatalogRepository<'conn>, SqliteDocumentRepository<'conn>>;

/// Keeps per-project documents in sync with their document type's content
/// slots.
#[derive(Parser)]
#[command(name = "docsync", version)]
struct Cli {
    /// TOML configuration file. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file; overrides `db.path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the core version.
    Ping,
    /// Check that the database answers queries.
    Health,
    /// Import document types from a catalog TOML file.
    Seed { path: PathBuf },
    /// Create a project.
    AddProject {
        #[arg(long)]
        title: String,
        /// Explicit project id; random when omitted.
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// Show a document type with its sections and subsections.
    DocType {
        /// Type name or id.
        document_type: String,
    },
    /// Show a project's document of the given type.
    Show {
        project: Uuid,
        document_type: String,
    },
    /// Create a project's document of the given type with empty cells.
    Create {
        project: Uuid,
        document_type: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Apply content items to a project's document.
    Update {
        project: Uuid,
        document_type: String,
        /// `subsection=text`; repeatable.
        #[arg(long = "item", value_parser = parse_text_item)]
        items: Vec<ContentItem>,
        /// JSON array of `{subsection_name|subsection_id, content}` items,
        /// applied before any `--item`.
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    run(Cli::parse())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db.path = db;
    }
    if let Some(dir) = config.logging.dir.take() {
        config.logging.dir = Some(absolutize(&dir)?);
    }
    init_logging_from_config(&config.logging).context("failed to start logging")?;

    match cli.command {
        Commands::Ping => print_json(&ping_report()),
        command => run_with_db(command, &config),
    }
}

fn run_with_db(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let conn = open_db(&config.db.path)
        .with_context(|| format!("failed to open `{}`", config.db.path.display()))?;
    let service = build_service(&conn, config)?;

    match command {
        Commands::Ping => unreachable!("ping is answered without a database"),
        Commands::Health => {
            service.health_check()?;
            print_json(&serde_json::json!({ "status": "ok" }))
        }
        Commands::Seed { path } => {
            let seed = load_catalog_seed(&path)?;
            let report = service.catalog().apply_seed(&seed)?;
            print_json(&serde_json::json!({
                "created": report.created,
                "skipped": report.skipped,
            }))
        }
        Commands::AddProject { title, id } => {
            let title = title.trim();
            if title.is_empty() {
                bail!("project title must not be blank");
            }
            let project = SqliteDocumentRepository::try_new(&conn)?
                .insert_project(id.unwrap_or_else(Uuid::new_v4), title)?;
            info!("event=project_add module=cli status=ok project_id={}", project.id);
            print_json(&project)
        }
        Commands::DocType { document_type } => {
            let definition = service.get_document_type(&DocumentTypeRef::parse(&document_type))?;
            print_json(definition.as_ref())
        }
        Commands::Show {
            project,
            document_type,
        } => print_json(
            &service.get_document_contents(project, &DocumentTypeRef::parse(&document_type))?,
        ),
        Commands::Create {
            project,
            document_type,
            title,
        } => print_json(&service.create_document(
            project,
            &DocumentTypeRef::parse(&document_type),
            title.as_deref(),
        )?),
        Commands::Update {
            project,
            document_type,
            items,
            json,
        } => {
            let mut batch = match json {
                Some(path) => read_json_items(&path)?,
                None => Vec::new(),
            };
            batch.extend(items);
            if batch.is_empty() {
                bail!("nothing to update; pass --item or --json");
            }
            print_json(&service.update_content(
                project,
                &DocumentTypeRef::parse(&document_type),
                &batch,
            )?)
        }
    }
}

fn ping_report() -> serde_json::Value {
    serde_json::json!({
        "ping": docsync_core::ping(),
        "version": docsync_core::core_version(),
    })
}

fn build_service<'conn>(
    conn: &'conn Connection,
    config: &AppConfig,
) -> anyhow::Result<Service<'conn>> {
    let cache = CatalogCache::new(config.catalog.cache_capacity, config.catalog.cache_ttl());
    let catalog = SchemaCatalog::new(SqliteCatalogRepository::try_new(conn)?, cache);
    Ok(DocumentService::new(catalog, SqliteDocumentRepository::try_new(conn)?)
        .with_duplicate_create(config.documents.duplicate_create))
}

fn parse_text_item(raw: &str) -> Result<ContentItem, String> {
    let (name, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `subsection=text`, got `{raw}`"))?;
    let item = ContentItem::by_name(name.trim(), DocumentContent::text(text));
    item.validate().map_err(|err| err.to_string())?;
    Ok(item)
}

fn read_json_items(path: &Path) -> anyhow::Result<Vec<ContentItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid content items in `{}`", path.display()))
}

fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to resolve working directory")?
        .join(path))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
