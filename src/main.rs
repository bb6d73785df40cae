//! # pinequery CLI
//!
//! Commands for ingesting the article CSV into a Pinecone index and
//! querying it with natural language.
//!
//! ## Usage
//!
//! ```bash
//! pinequery --config ./config/pinequery.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pinequery ingest` | Normalize the CSV, embed titles, upsert into the index |
//! | `pinequery query "<question>"` | Interpret a question and run a filtered similarity query |
//! | `pinequery interpret "<question>"` | Show the filter and semantic phrase without querying |
//! | `pinequery serve` | Start the JSON HTTP server |
//!
//! API keys are read from the `PINECONE_API_KEY` and `GEMINI_API_KEY`
//! (or `OPENAI_API_KEY`) environment variables.

mod config;
mod dates;
mod embedding;
mod ingest;
mod interpreter;
mod models;
mod normalize;
mod query;
mod server;
mod vector_store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pinequery — natural-language query agent for a Pinecone vector index.
#[derive(Parser)]
#[command(
    name = "pinequery",
    about = "Natural-language query agent for a Pinecone vector index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pinequery.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the article CSV into the vector index.
    ///
    /// Normalizes rows, embeds titles, decomposes publication dates,
    /// ensures the index exists, and upserts every entry. Intermediate
    /// JSON artifacts are written between stages.
    Ingest {
        /// CSV file to ingest (overrides `ingest.csv_path`).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Index name (overrides `pinecone.index`).
        #[arg(long)]
        index: Option<String>,

        /// Similarity metric: cosine, euclidean, or dotproduct.
        #[arg(long)]
        metric: Option<String>,

        /// Vector dimension (overrides `pinecone.dimension`).
        #[arg(long)]
        dimension: Option<usize>,

        /// Show row counts without calling any external service.
        #[arg(long)]
        dry_run: bool,
    },

    /// Query the index with a natural-language question.
    ///
    /// Converts the question into a metadata filter and a semantic
    /// phrase, embeds the phrase, and prints ranked matches.
    Query {
        /// The question, e.g. "articles by Jane Doe from last year".
        text: String,

        /// Index name (overrides `pinecone.index`).
        #[arg(long)]
        index: Option<String>,

        /// Number of results to return (1-10).
        #[arg(long)]
        top_k: Option<usize>,

        /// Anchor date for relative time expressions (YYYY-MM-DD).
        /// Defaults to `llm.reference_date` or today's UTC date.
        #[arg(long)]
        reference_date: Option<String>,
    },

    /// Interpret a question without querying the index.
    ///
    /// Prints the extracted metadata filter and semantic phrase.
    Interpret {
        /// The question to interpret.
        text: String,

        /// Anchor date for relative time expressions (YYYY-MM-DD).
        #[arg(long)]
        reference_date: Option<String>,
    },

    /// Start the JSON HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            csv,
            index,
            metric,
            dimension,
            dry_run,
        } => {
            let metric = metric.as_deref().map(config::Metric::parse).transpose()?;
            let overrides = ingest::IngestOverrides {
                csv_path: csv,
                index,
                metric,
                dimension,
            };
            ingest::run_ingest(&cfg, &overrides, dry_run).await?;
        }
        Commands::Query {
            text,
            index,
            top_k,
            reference_date,
        } => {
            let date = interpreter::resolve_reference_date(&cfg.llm, reference_date.as_deref())?;
            let outcome = query::run_query(&cfg, &text, index.as_deref(), top_k, date).await?;
            query::print_outcome(&outcome);
        }
        Commands::Interpret {
            text,
            reference_date,
        } => {
            let date = interpreter::resolve_reference_date(&cfg.llm, reference_date.as_deref())?;
            let interpreted = query::run_interpret(&cfg, &text, date).await?;
            println!("{}", serde_json::to_string_pretty(&interpreted)?);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
