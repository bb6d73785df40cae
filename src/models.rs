//! Core data models used throughout pinequery.
//!
//! These types represent the article records, embedded records, and vector
//! store entries that flow through the ingestion and query pipeline. The
//! serialized forms double as the intermediate JSON artifacts written
//! between ingestion stages and as the Pinecone wire format.

use serde::{Deserialize, Serialize};

/// Normalized article produced from one CSV row.
///
/// `id` is the source page URL and uniquely identifies the article;
/// re-ingesting the same id overwrites the stored entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub published_date: String,
    pub author: String,
    pub tags: Vec<String>,
}

/// An article plus the embedding of its title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    #[serde(flatten)]
    pub record: ArticleRecord,
    pub title_embedding: Vec<f32>,
}

/// Metadata stored alongside each vector in the index.
///
/// The date triple is `None` when the published date failed to parse;
/// the store simply has no year/month/day fields for such entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    pub title: String,
    pub published_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_day: Option<u32>,
    pub author: String,
    pub tags: Vec<String>,
}

/// One upsertable entry in the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// A ranked match returned by a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<EntryMetadata>,
}

/// The interpreter's reading of a natural-language question.
#[derive(Debug, Clone, Serialize)]
pub struct InterpretedQuery {
    pub filter: serde_json::Value,
    pub semantic_query: String,
}
