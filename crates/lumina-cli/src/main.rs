//! Lumina CLI - Command-line interface
//!
//! Usage:
//!   lumina ingest <pdf>...
//!   lumina ask <question>
//!   lumina probe [--model M | --models a,b,c] [--prompt P]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lumina_core::{AppConfig, DocumentRegistry, LlmProvider, SqliteRegistry};
use lumina_rag::{create_llm_client, ChatCompletionClient, DocumentIngestor, QueryOrchestrator};
use lumina_vector::{create_embedding_client, open_vector_store};
use std::path::PathBuf;

/// Models tried by `probe` when none are given
const DEFAULT_PROBE_MODELS: &[&str] = &[
    "sonar",
    "sonar-pro",
    "llama-3.1-sonar-small-128k-online",
    "llama-3.1-sonar-large-128k-online",
    "llama-3.1-sonar-huge-128k-online",
];

#[derive(Parser)]
#[command(name = "lumina")]
#[command(about = "Chat with your PDF documents")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables still override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index PDF files into the vector store
    Ingest {
        /// PDF files to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Ask {
        /// Question to ask
        question: String,

        /// Print the retrieved chunks before the answer
        #[arg(long)]
        show_context: bool,
    },
    /// Check that the completion API accepts the key and a model
    Probe {
        /// Single model to try
        #[arg(long, conflicts_with = "models")]
        model: Option<String>,

        /// Comma-separated models to try in order until one answers
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,

        /// Message to send
        #[arg(long, default_value = "Hello")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    match cli.command {
        Commands::Ingest { paths } => ingest(&config, paths).await,
        Commands::Ask {
            question,
            show_context,
        } => ask(&config, &question, show_context).await,
        Commands::Probe {
            model,
            models,
            prompt,
        } => {
            let candidates = match (model, models.is_empty()) {
                (Some(model), _) => vec![model],
                (None, false) => models,
                (None, true) => DEFAULT_PROBE_MODELS.iter().map(|m| m.to_string()).collect(),
            };
            probe(&config, &candidates, &prompt).await
        }
    }
}

async fn ingest(config: &AppConfig, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let registry = SqliteRegistry::connect(&config.storage.database_url).await?;
    let embedder = create_embedding_client(&config.embedding, &config.llm)?;
    let store = open_vector_store(config, embedder.as_ref()).await?;
    let ingestor = DocumentIngestor::from_config(&config.rag, embedder, store)?;

    let mut failures = 0;
    for path in paths {
        let record = registry.create(&path.display().to_string()).await?;
        match ingestor.ingest(&path, Some(record.id)).await {
            Ok(report) => {
                registry.mark_processed(record.id).await?;
                println!(
                    "{}: {} pages, {} chunks",
                    path.display(),
                    report.page_count,
                    report.chunk_count
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} document(s) failed to ingest");
    }
    Ok(())
}

async fn ask(config: &AppConfig, question: &str, show_context: bool) -> anyhow::Result<()> {
    let embedder = create_embedding_client(&config.embedding, &config.llm)?;
    let store = open_vector_store(config, embedder.as_ref()).await?;
    let llm = create_llm_client(&config.llm)?;
    let orchestrator = QueryOrchestrator::new(embedder, store, llm, config.rag.top_k);

    let answer = orchestrator.answer(question).await?;

    if show_context {
        for (rank, hit) in answer.chunks.iter().enumerate() {
            println!(
                "[{}] {} p.{} (score {:.3})",
                rank + 1,
                hit.metadata.source,
                hit.metadata.page,
                hit.score
            );
            println!("{}\n", hit.text);
        }
    }
    println!("{}", answer.text());
    Ok(())
}

async fn probe(config: &AppConfig, models: &[String], prompt: &str) -> anyhow::Result<()> {
    if config.llm.provider == LlmProvider::Ollama {
        bail!("probe checks hosted providers; LLM_PROVIDER is ollama");
    }
    let client =
        ChatCompletionClient::from_config(&config.llm).context("building completion client")?;

    for model in models {
        println!("Testing model: {model}...");
        match client.probe(model, prompt).await {
            Ok(outcome) if outcome.is_success() => {
                println!("SUCCESS! Model '{model}' is valid.");
                if let Some(answer) = outcome.answer() {
                    let preview: String = answer.chars().take(50).collect();
                    println!("Response: {preview}...");
                }
                return Ok(());
            }
            Ok(outcome) => {
                println!("FAILED: {model} - Status: {}", outcome.status);
                println!("{}", outcome.body);
            }
            // A missing key fails every model the same way
            Err(e @ lumina_core::CompletionError::MissingCredential { .. }) => bail!(e),
            Err(e) => println!("ERROR: {model} - {e}"),
        }
    }

    bail!("no model answered successfully")
}
