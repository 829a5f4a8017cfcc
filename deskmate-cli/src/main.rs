//! DeskMate CLI - ask questions about your documents
//!
//! # Commands
//!
//! ```bash
//! # Build the index from one or more text files
//! deskmate ingest handbook.txt policies.txt
//!
//! # Ask a question against the index
//! deskmate ask "How many vacation days do I get?"
//!
//! # Show the chunks a question retrieves, without generating an answer
//! deskmate search "vacation days" -k 6
//!
//! # Preview how a file is chunked
//! deskmate chunk handbook.txt --size 500 --overlap 100
//!
//! # Delete the index
//! deskmate reset
//! ```
//!
//! Settings come from `deskmate.toml`, `DESKMATE_*` variables and
//! `GOOGLE_API_KEY`. Set `RUST_LOG=deskmate_lib=debug` for progress logs.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use deskmate_lib::{
    Error,
    answer::BackendUsed,
    chunk::{ChunkMetadata, Chunker, RecursiveChunker},
    config::Settings,
    embed::Embedder,
    generate::GenerationBackend,
    pipeline::{Document, DynPipeline, PlainTextExtractor, TextExtractor},
    store::VectorIndex,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deskmate")]
#[command(about = "Ask questions about your documents")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ./deskmate.toml when present)
    #[arg(long, global = true, env = "DESKMATE_CONFIG")]
    config: Option<PathBuf>,

    /// Index directory, overrides `index.location`
    #[arg(long, global = true)]
    location: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index documents, replacing the previous index
    Ingest {
        /// Text files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a question from the indexed documents
    Ask {
        question: String,
    },

    /// Show the chunks retrieved for a question
    Search {
        question: String,

        /// Number of chunks to return
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Chunk a file and show the result
    Chunk {
        /// Input file to chunk
        input: PathBuf,

        /// Maximum characters per chunk
        #[arg(long)]
        size: Option<usize>,

        /// Characters shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Delete the persisted index
    Reset,
}

fn preview(text: &str, max_chars: usize) -> String {
    let shown: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{shown}...")
    } else {
        shown
    }
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, stopping after the current batch");
        cancel.cancel();
    }
}

fn run(command: Commands, mut settings: Settings, cancel: CancellationToken) -> Result<()> {
    match command {
        Commands::Ingest { files } => {
            let documents = files
                .iter()
                .map(|path| Document::from_path(path, &PlainTextExtractor))
                .collect::<deskmate_lib::Result<Vec<_>>>()?;

            let mut pipeline = DynPipeline::from_settings(&settings)?.with_cancellation(cancel);
            println!(
                "Indexing {} document(s) with {}...",
                documents.len(),
                pipeline.embedder().model_name()
            );
            let report = pipeline.ingest(&documents)?;
            println!(
                "Done! {} chunks ({} dimensions) saved to {}",
                report.chunks,
                report.dimension,
                report.location.display()
            );
        }

        Commands::Ask { question } => {
            let mut pipeline = DynPipeline::from_settings(&settings)?;
            let answer = pipeline.ask(&question)?;

            println!("{}\n", answer.text.trim());
            match answer.backend_used {
                BackendUsed::Primary => {
                    println!("(answered by {})", pipeline.orchestrator().primary().model_name());
                }
                BackendUsed::Fallback => {
                    if let Some(e) = &answer.primary_error {
                        eprintln!("primary model failed: {e}");
                    }
                    println!(
                        "(answered by fallback {})",
                        pipeline.orchestrator().fallback().model_name()
                    );
                }
            }
        }

        Commands::Search { question, k } => {
            if let Some(k) = k {
                settings.retrieval.k = k;
            }
            let mut pipeline = DynPipeline::from_settings(&settings)?;
            let results = pipeline.retrieve(&question)?;

            println!("\n=== Results ===\n");
            for (i, result) in results.iter().enumerate() {
                let source = result.chunk.metadata.source_id.as_deref().unwrap_or("-");
                println!("#{} (score: {:.4}, source: {source})", i + 1, result.score);
                println!("---");
                println!("{}\n", preview(&result.chunk.content, 300));
            }
        }

        Commands::Chunk { input, size, overlap } => {
            let text = PlainTextExtractor.extract_text(&input)?;
            let chunker = RecursiveChunker::new(
                size.unwrap_or(settings.chunking.max_size),
                overlap.unwrap_or(settings.chunking.overlap),
            )?;
            let chunks = chunker.chunk(&text, ChunkMetadata::default());

            println!(
                "Chunked '{}' into {} chunks (size {}, overlap {}):\n",
                input.display(),
                chunks.len(),
                chunker.max_size(),
                chunker.overlap()
            );
            for (i, chunk) in chunks.iter().enumerate() {
                println!(
                    "--- Chunk {} ({} chars at byte {}, id: {}) ---",
                    i + 1,
                    chunk.content.chars().count(),
                    chunk.metadata.position,
                    &chunk.id[..8]
                );
                println!("{}\n", preview(&chunk.content, 200));
            }
        }

        Commands::Reset => {
            VectorIndex::destroy(&settings.index.location)?;
            println!("Deleted index at {}", settings.index.location.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    if matches!(cli.command, Commands::Ingest { .. }) {
        tokio::spawn(cancel_on_interrupt(cancel.clone()));
    }

    // providers use blocking HTTP clients, keep them off the async workers
    let result = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut settings = Settings::load(cli.config.as_deref())?;
        if let Some(location) = cli.location {
            settings.index.location = location;
        }
        run(cli.command, settings, cancel)
    })
    .await?;

    if let Err(e) = &result {
        if let Some(error) = e.downcast_ref::<Error>() {
            eprintln!("hint: {}", error.user_hint());
        }
    }
    result
}
