//! Ingestion pipeline orchestration.
//!
//! Coordinates the full upload flow: CSV normalization → title embedding
//! → date decomposition → index provisioning → upsert. Each stage fully
//! materializes its output to a JSON artifact before the next starts;
//! the artifacts are a hand-off between stages, not a cache. A failure
//! at any stage aborts the run — rerunning reprocesses everything from
//! the start, with upserts naturally idempotent by id.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::dates::decompose_date;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::{ArticleRecord, EmbeddedRecord, EntryMetadata, VectorEntry};
use crate::normalize::read_articles;
use crate::vector_store::PineconeClient;

/// Overrides for a single ingestion run (CLI flags / HTTP request body).
#[derive(Debug, Default, Clone)]
pub struct IngestOverrides {
    pub csv_path: Option<std::path::PathBuf>,
    pub index: Option<String>,
    pub metric: Option<crate::config::Metric>,
    pub dimension: Option<usize>,
}

/// Counts reported after a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub rows: usize,
    pub entries: usize,
    pub upserted: u64,
    pub dated: usize,
    pub undated: usize,
}

/// Run the ingestion flow. With `dry_run` set, stop after normalization
/// and report counts without touching any external service.
pub async fn run_ingest(
    config: &Config,
    overrides: &IngestOverrides,
    dry_run: bool,
) -> Result<Option<IngestSummary>> {
    let mut config = config.clone();
    apply_overrides(&mut config, overrides);

    let csv_path = &config.ingest.csv_path;
    let articles = read_articles(csv_path)
        .with_context(|| format!("Ingestion failed reading {}", csv_path.display()))?;

    if dry_run {
        println!("ingest {} (dry-run)", csv_path.display());
        println!("  rows found: {}", articles.len());
        return Ok(None);
    }

    // Fail fast on missing credentials before any stage runs.
    let provider = embedding::create_provider(&config.embedding)?;
    let client = PineconeClient::new(&config.pinecone)?;

    let artifacts_dir = &config.ingest.artifacts_dir;
    std::fs::create_dir_all(artifacts_dir)
        .with_context(|| format!("Failed to create {}", artifacts_dir.display()))?;

    write_artifact(&artifacts_dir.join("articles.json"), &articles)?;

    let embedded = embed_titles(&config, &articles).await?;
    write_artifact(&artifacts_dir.join("embedded.json"), &embedded)?;

    let entries = build_entries(embedded);
    write_artifact(&artifacts_dir.join("entries.json"), &entries)?;

    let dated = entries
        .iter()
        .filter(|e| e.metadata.published_year.is_some())
        .count();

    let handle = client.ensure_index(&config.pinecone).await?;
    let upserted = handle.upsert(&entries).await?;

    let summary = IngestSummary {
        rows: articles.len(),
        entries: entries.len(),
        upserted,
        dated,
        undated: entries.len() - dated,
    };

    println!("ingest {}", csv_path.display());
    println!("  rows: {}", summary.rows);
    println!(
        "  embedded titles: {} ({}, dim {})",
        summary.entries,
        provider.model_name(),
        provider.dims()
    );
    println!("  dated entries: {}", summary.dated);
    println!("  undated entries: {}", summary.undated);
    println!("  upserted: {}", summary.upserted);
    println!("ok");

    Ok(Some(summary))
}

fn apply_overrides(config: &mut Config, overrides: &IngestOverrides) {
    if let Some(ref path) = overrides.csv_path {
        config.ingest.csv_path = path.clone();
    }
    if let Some(ref index) = overrides.index {
        config.pinecone.index = index.clone();
    }
    if let Some(metric) = overrides.metric {
        config.pinecone.metric = metric;
    }
    if let Some(dimension) = overrides.dimension {
        config.pinecone.dimension = dimension;
        config.embedding.dims = dimension;
    }
}

/// Embed every title in config-sized batches, preserving record order.
async fn embed_titles(config: &Config, articles: &[ArticleRecord]) -> Result<Vec<EmbeddedRecord>> {
    let mut embedded = Vec::with_capacity(articles.len());

    for batch in articles.chunks(config.embedding.batch_size) {
        let titles: Vec<String> = batch.iter().map(|a| a.title.clone()).collect();
        let vectors = embedding::embed_texts(&config.embedding, &titles).await?;
        for (article, vector) in batch.iter().zip(vectors) {
            embedded.push(EmbeddedRecord {
                record: article.clone(),
                title_embedding: vector,
            });
        }
    }

    Ok(embedded)
}

/// Decompose each record's date and shape it into a vector store entry.
pub fn build_entries(embedded: Vec<EmbeddedRecord>) -> Vec<VectorEntry> {
    embedded
        .into_iter()
        .map(|rec| {
            let (year, month, day) = decompose_date(&rec.record.published_date);
            VectorEntry {
                id: rec.record.id,
                values: rec.title_embedding,
                metadata: EntryMetadata {
                    title: rec.record.title,
                    published_date: rec.record.published_date,
                    published_year: year,
                    published_month: month,
                    published_day: day,
                    author: rec.record.author,
                    tags: rec.record.tags,
                },
            }
        })
        .collect()
}

fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write artifact {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleRecord;

    fn record(id: &str, date: &str) -> EmbeddedRecord {
        EmbeddedRecord {
            record: ArticleRecord {
                id: id.to_string(),
                title: "ML trends".to_string(),
                published_date: date.to_string(),
                author: "Alice Zhang".to_string(),
                tags: vec!["machine learning".to_string()],
            },
            title_embedding: vec![0.1, 0.2],
        }
    }

    #[test]
    fn example_row_gets_decomposed_date() {
        let entries = build_entries(vec![record("http://x/1", "2023-06-15T00:00:00Z")]);
        assert_eq!(entries.len(), 1);
        let meta = &entries[0].metadata;
        assert_eq!(meta.published_year, Some(2023));
        assert_eq!(meta.published_month, Some(6));
        assert_eq!(meta.published_day, Some(15));
        assert_eq!(meta.author, "Alice Zhang");
    }

    #[test]
    fn unparseable_date_keeps_entry_without_date_fields() {
        let entries = build_entries(vec![record("http://x/2", "circa 1999")]);
        let meta = &entries[0].metadata;
        assert_eq!(meta.published_year, None);
        assert_eq!(meta.published_month, None);
        assert_eq!(meta.published_day, None);
        assert_eq!(meta.published_date, "circa 1999");
    }

    #[test]
    fn entry_keeps_embedding_values_and_id() {
        let entries = build_entries(vec![record("http://x/1", "2023-06-15")]);
        assert_eq!(entries[0].id, "http://x/1");
        assert_eq!(entries[0].values, vec![0.1, 0.2]);
    }
}
