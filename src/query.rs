//! Query orchestration and result presentation.
//!
//! Takes raw user text, runs filter and semantic extraction (independent
//! completions), embeds the semantic phrase, queries the vector store,
//! and presents the interpreted query plus ranked matches. This is the
//! single query entry point.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Config;
use crate::embedding;
use crate::interpreter;
use crate::models::{InterpretedQuery, QueryMatch};
use crate::vector_store::PineconeClient;

/// Interpreted query plus the matches it produced.
#[derive(Debug, Serialize)]
pub struct QueryOutcome {
    pub filter: serde_json::Value,
    pub semantic_query: String,
    pub matches: Vec<QueryMatch>,
}

/// Run the full query flow against the configured index.
pub async fn run_query(
    config: &Config,
    user_text: &str,
    index_override: Option<&str>,
    top_k_override: Option<usize>,
    reference_date: NaiveDate,
) -> Result<QueryOutcome> {
    if user_text.trim().is_empty() {
        bail!("Query text must not be empty");
    }

    let top_k = top_k_override.unwrap_or(config.query.top_k);
    if !(1..=10).contains(&top_k) {
        bail!("top_k must be between 1 and 10, got {}", top_k);
    }

    let mut pinecone = config.pinecone.clone();
    if let Some(index) = index_override {
        pinecone.index = index.to_string();
    }

    // Boundary checks before any external call.
    embedding::create_provider(&config.embedding)?;
    let client = PineconeClient::new(&pinecone)?;

    let interpreted = interpreter::interpret(&config.llm, user_text, reference_date).await?;

    let query_vector = embedding::embed_query(&config.embedding, &interpreted.semantic_query).await?;

    let description = client.describe_index(&pinecone.index).await?;
    let handle = client.index_handle(&description);
    let matches = handle.query(&query_vector, &interpreted.filter, top_k).await?;

    Ok(QueryOutcome {
        filter: interpreted.filter,
        semantic_query: interpreted.semantic_query,
        matches,
    })
}

/// Interpret a question without touching the store (CLI `interpret`).
pub async fn run_interpret(
    config: &Config,
    user_text: &str,
    reference_date: NaiveDate,
) -> Result<InterpretedQuery> {
    if user_text.trim().is_empty() {
        bail!("Query text must not be empty");
    }
    interpreter::interpret(&config.llm, user_text, reference_date).await
}

/// Print an outcome in the CLI format.
pub fn print_outcome(outcome: &QueryOutcome) {
    print!("{}", format_outcome(outcome));
}

/// Render an outcome as the CLI report.
pub fn format_outcome(outcome: &QueryOutcome) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Metadata Filter: {}",
        serde_json::to_string_pretty(&outcome.filter).unwrap_or_else(|_| "{}".to_string())
    );
    let _ = writeln!(out, "Semantic Query: {}", outcome.semantic_query);
    out.push('\n');

    if outcome.matches.is_empty() {
        out.push_str("No results found.\n");
        return out;
    }

    out.push_str("Results:\n");
    for (i, m) in outcome.matches.iter().enumerate() {
        let _ = writeln!(out, "{}. [{:.4}] {}", i + 1, m.score, m.id);
        if let Some(ref meta) = m.metadata {
            let _ = writeln!(out, "    title: {}", meta.title);
            let _ = writeln!(out, "    author: {}", meta.author);
            let _ = writeln!(out, "    published: {}", meta.published_date);
            if !meta.tags.is_empty() {
                let _ = writeln!(out, "    tags: {}", meta.tags.join(", "));
            }
        }
        out.push('\n');
    }
    out
}
