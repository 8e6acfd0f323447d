//! ArticleForge ingestion CLI
//!
//! Administrative entry point for the publication state machine:
//! - `ingest` an article-json document
//! - `publish` a previously-ingested version
//! - `ingest-publish` both, as a single unit of work
//!
//! Prints the `{status, id, datetime}` record on success and the
//! `{title, detail}` error body on failure; logs go to stderr.

use articleforge_ingestion::errors::{error_body, exit_code};
use articleforge_ingestion::publisher::{self, IngestOptions, PublishOptions, TransitionReport};
use articleforge_common::errors::{AppError, Result};
use articleforge_common::events::EventSink;
use articleforge_common::{AppConfig, DbPool, SchemaRegistry, VERSION};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "articleforge-ingest", version, about = "ArticleForge ingest/publish tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest an article-json document
    Ingest {
        /// Path to the document, or '-' for stdin
        path: PathBuf,

        /// Manuscript id the document must carry
        #[arg(long)]
        msid: Option<i64>,

        /// Version the document must carry
        #[arg(long)]
        version: Option<i32>,

        /// Permit rewriting a published version
        #[arg(long)]
        force: bool,

        /// Evaluate the transition without committing
        #[arg(long)]
        dry_run: bool,
    },

    /// Publish a previously-ingested version
    Publish {
        #[arg(long)]
        msid: i64,

        #[arg(long)]
        version: i32,

        /// Publication timestamp (RFC 3339); defaults to now
        #[arg(long)]
        when: Option<String>,

        /// Permit overwriting an existing publication timestamp
        #[arg(long)]
        force: bool,

        /// Evaluate the transition without committing
        #[arg(long)]
        dry_run: bool,
    },

    /// Ingest then publish as a single unit of work
    IngestPublish {
        /// Path to the document, or '-' for stdin
        path: PathBuf,

        #[arg(long)]
        msid: Option<i64>,

        #[arg(long)]
        version: Option<i32>,

        #[arg(long)]
        force: bool,

        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs on stderr; stdout carries only the report
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            let rendered = serde_json::to_string(&report)
                .unwrap_or_else(|_| format!("{{\"status\": \"{:?}\"}}", report.status));
            println!("{}", rendered);
        }
        Err(err) => {
            tracing::error!(error = %err, "transition failed");
            let body = serde_json::to_string(&error_body(&err))
                .unwrap_or_else(|_| err.to_string());
            println!("{}", body);
            std::process::exit(exit_code(&err));
        }
    }
}

async fn run(cli: Cli) -> Result<TransitionReport> {
    info!("ArticleForge ingest v{}", VERSION);

    let config = AppConfig::load().map_err(|e| AppError::Configuration {
        message: format!("failed to load configuration: {}", e),
    })?;

    let db = DbPool::new(&config.database).await?;
    let registry = SchemaRegistry::from_dir(&config.schemas.dir)?;
    let sink = EventSink::from_config(&config.events).await;

    match cli.command {
        Command::Ingest {
            path,
            msid,
            version,
            force,
            dry_run,
        } => {
            let doc = read_document(&path)?;
            let opts = IngestOptions {
                msid,
                version,
                force,
                dry_run,
            };
            publisher::ingest(&db, &registry, &sink, &config, &doc, &opts).await
        }

        Command::Publish {
            msid,
            version,
            when,
            force,
            dry_run,
        } => {
            let opts = PublishOptions {
                msid,
                version,
                when: when.as_deref().map(parse_when).transpose()?,
                force,
                dry_run,
            };
            publisher::publish(&db, &registry, &sink, &opts).await
        }

        Command::IngestPublish {
            path,
            msid,
            version,
            force,
            dry_run,
        } => {
            let doc = read_document(&path)?;
            let opts = IngestOptions {
                msid,
                version,
                force,
                dry_run,
            };
            publisher::ingest_publish(&db, &registry, &sink, &config, &doc, &opts).await
        }
    }
}

fn read_document(path: &PathBuf) -> Result<Value> {
    let raw = if path.to_str() == Some("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    serde_json::from_str(&raw).map_err(|e| AppError::BadRequest {
        message: format!("document is not valid JSON: {}", e),
    })
}

fn parse_when(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::BadRequest {
            message: format!("bad --when timestamp {:?}: {}", raw, e),
        })
}
