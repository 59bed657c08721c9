mod server;
mod state;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docsearch_core::{discover_files, media_type_for_path, Document, Upload};
use state::{AppState, BackendArgs};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docsearch", version, about = "Upload, search and correct documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    backends: BackendArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        #[arg(long, env = "DOCSEARCH_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Ingest a file, or every file under a folder.
    Ingest {
        #[arg(long)]
        file: PathBuf,
        /// Stored with every ingested document.
        #[arg(long)]
        description: Option<String>,
    },
    /// Print the documents matching a query.
    Search {
        #[arg(long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "docsearch boot"
    );

    let state = AppState::connect(&cli.backends).await?;

    match cli.command {
        Command::Serve { bind } => server::serve(&bind, state).await?,
        Command::Ingest { file, description } => ingest(&state, &file, description).await?,
        Command::Search { query } => {
            let documents = state.resolver.search(&query).await?;
            println!("query: {query}");
            println!("{} document(s)", documents.len());
            for document in &documents {
                print_document(document);
            }
        }
    }

    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct IngestSummary {
    ingested: usize,
    skipped: usize,
}

async fn ingest(state: &AppState, path: &Path, description: Option<String>) -> anyhow::Result<()> {
    let summary = ingest_path(state, path, description).await?;

    println!(
        "{} of {} file(s) ingested at {}",
        summary.ingested,
        summary.ingested + summary.skipped,
        Utc::now().to_rfc3339()
    );
    Ok(())
}

/// Ingests one file, or every file under a folder. In folder mode a file that
/// cannot be read or ingested is logged and skipped.
async fn ingest_path(
    state: &AppState,
    path: &Path,
    description: Option<String>,
) -> anyhow::Result<IngestSummary> {
    let folder_mode = path.is_dir();
    let files = if folder_mode {
        discover_files(path)
    } else {
        vec![path.to_path_buf()]
    };

    let mut summary = IngestSummary::default();
    for file in &files {
        match ingest_file(state, file, description.clone()).await {
            Ok(()) => summary.ingested += 1,
            Err(error) if folder_mode => {
                warn!(path = %file.display(), error = %format!("{error:#}"), "skipped file");
                summary.skipped += 1;
            }
            Err(error) => return Err(error),
        }
    }

    Ok(summary)
}

async fn ingest_file(state: &AppState, file: &Path, description: Option<String>) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let upload = Upload {
        bytes,
        content_type: media_type_for_path(file).to_string(),
        filename: file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        description,
    };

    let report = state
        .pipeline
        .ingest_with_report(upload)
        .await
        .with_context(|| format!("ingesting {}", file.display()))?;

    println!(
        "{} -> document {} ({} of {} chunk(s) indexed)",
        file.display(),
        report.document.id,
        report.indexed_count(),
        report.chunk_count
    );
    Ok(())
}

fn print_document(document: &Document) {
    println!(
        "[{}] {} ({}) uploaded={}",
        document.id,
        document.filename.as_deref().unwrap_or("<unnamed>"),
        document.content_type,
        document.uploaded_at.to_rfc3339()
    );
    if let Some(description) = &document.description {
        println!("  description: {description}");
    }
    let preview: String = document.content_text.chars().take(200).collect();
    if !preview.is_empty() {
        println!("  {preview}");
    }
}
