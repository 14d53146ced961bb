//! # brdgen CLI (`brd`)
//!
//! The `brd` binary drives the BRD generation pipeline. All commands accept
//! a `--config` flag pointing to a TOML configuration file.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brd index <paths...>` | Build (or load) the vector store for a document set |
//! | `brd generate <paths...>` | Run the batch pipeline: index, agent chain, persist BRDs |
//! | `brd search "<query>"` | Inspect MMR retrieval against the persisted store |
//! | `brd interactive <path>` | Generate one BRD, then refine it from stdin feedback |
//!
//! ## Examples
//!
//! ```bash
//! brd generate assessments/*.pdf --config ./config/brd.toml
//! brd search "objectives of the interface assessment" --k 5
//! brd interactive new_assessment.pdf
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use brdgen::agents::BrdAgents;
use brdgen::config::{self, Config};
use brdgen::embedding;
use brdgen::error::error_chain;
use brdgen::llm::{self, SamplingConfig};
use brdgen::pipeline::Pipeline;
use brdgen::retrieve::Retriever;
use brdgen::session::InteractiveSession;
use brdgen::store::VectorStore;

/// brdgen — retrieval-augmented BRD generation from assessment reports.
#[derive(Parser)]
#[command(
    name = "brd",
    about = "Generate Business Requirements Documents from assessment reports",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/brd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector store for a document set, or load it when the
    /// persistence location is already populated.
    Index {
        /// Assessment documents (.pdf / .docx).
        paths: Vec<PathBuf>,
    },

    /// Run the full batch pipeline over a document set.
    ///
    /// Each document runs extract → generate → validate independently;
    /// failures and rejected BRDs are logged and skipped without aborting
    /// the batch.
    Generate {
        /// Assessment documents (.pdf / .docx).
        paths: Vec<PathBuf>,
    },

    /// Search the persisted vector store with MMR retrieval.
    Search {
        query: String,

        /// Number of chunks to retrieve.
        #[arg(long)]
        k: Option<usize>,

        /// MMR relevance/diversity weight in [0, 1]; 1 is plain top-k.
        #[arg(long)]
        lambda: Option<f32>,
    },

    /// Generate a BRD for one document, then refine it interactively.
    ///
    /// Reads feedback lines from stdin; an empty line ends the session.
    /// Errors are printed as the output text rather than aborting.
    Interactive {
        /// Assessment document (.pdf / .docx).
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { paths } => run_index(config, paths).await,
        Commands::Generate { paths } => run_generate(config, paths).await,
        Commands::Search { query, k, lambda } => run_search(config, query, k, lambda).await,
        Commands::Interactive { path } => run_interactive(config, path).await,
    }
}

fn build_agents(config: &Config) -> Result<BrdAgents> {
    let client = llm::create_client(&config.generation)?;
    let mut agents = BrdAgents::new(client, SamplingConfig::from_config(&config.generation))
        .with_example_char_budget(config.few_shot.example_char_budget);

    let pairs: Vec<(PathBuf, PathBuf)> = config
        .few_shot
        .pairs
        .iter()
        .map(|p| (p.assessment.clone(), p.brd.clone()))
        .collect();
    if !pairs.is_empty() {
        let loaded = agents.load_few_shot_examples(&pairs);
        println!("loaded {} few-shot example(s)", loaded);
    }

    Ok(agents)
}

async fn run_index(config: Config, paths: Vec<PathBuf>) -> Result<()> {
    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);

    let (documents, skipped) = brdgen::pipeline::load_documents(&paths);
    let store = brdgen::pipeline::index_or_load(&config, &embedder, &documents).await?;

    println!("index {}", config.store.dir.display());
    println!("  documents: {}", documents.len());
    println!("  skipped: {}", skipped);
    println!("  embedding model: {}", store.model_name());
    println!("  dims: {}", store.dims());
    println!("ok");
    Ok(())
}

async fn run_generate(config: Config, paths: Vec<PathBuf>) -> Result<()> {
    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let agents = build_agents(&config)?;
    let pipeline = Pipeline::new(config, embedder, agents);

    let report = pipeline.run(&paths).await?;

    println!("generate");
    println!("  inputs: {}", paths.len());
    println!("  skipped at ingestion: {}", report.skipped_ingestion);
    println!("  generated: {}", report.generated.len());
    println!("  rejected by validation: {}", report.rejected);
    println!("  failed: {}", report.failed);
    for brd in &report.generated {
        println!(
            "  {} -> {}",
            brd.source_path.display(),
            brd.output_path.display()
        );
    }
    println!("ok");
    Ok(())
}

async fn run_search(
    config: Config,
    query: String,
    k: Option<usize>,
    lambda: Option<f32>,
) -> Result<()> {
    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let store = VectorStore::load(&config.store.dir, embedder.model_name()).await?;
    let retriever = Retriever::new(store, embedder)?;

    let k = k.unwrap_or(config.retrieval.k);
    let lambda = lambda.unwrap_or(config.retrieval.lambda);
    let results = retriever.search(&query, k, lambda).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        let excerpt: String = result.chunk.text.chars().take(160).collect();
        println!(
            "{}. [{:.3}] {} #{}",
            i + 1,
            result.score,
            result.chunk.document_id,
            result.chunk.sequence_index
        );
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
    }
    Ok(())
}

async fn run_interactive(config: Config, path: PathBuf) -> Result<()> {
    let agents = build_agents(&config)?;
    let mut session = InteractiveSession::new(
        agents,
        config.chunking.extraction.clone(),
        config.output.dir.clone(),
        config.output.interactive_filename.clone(),
    );

    // The interactive path reports failures as its output text (full
    // chain), trading polish for debuggability.
    match session.generate_from_file(&path).await {
        Ok(output) => {
            if let Some(summary) = &output.assessment_summary {
                println!("--- Assessment Summary ---\n{}\n", summary);
            }
            println!("--- BRD ---\n{}\n", output.brd);
            println!("saved to {}", output.saved_to.display());
        }
        Err(e) => {
            println!("Error: {}", error_chain(&e));
            return Ok(());
        }
    }

    let stdin = std::io::stdin();
    loop {
        print!("feedback> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let feedback = line.trim();
        if feedback.is_empty() {
            break;
        }

        match session.refine(feedback).await {
            Ok(output) => {
                println!("--- BRD ---\n{}\n", output.brd);
                println!("saved to {}", output.saved_to.display());
            }
            Err(e) => println!("Error: {}", error_chain(&e)),
        }
    }

    Ok(())
}
