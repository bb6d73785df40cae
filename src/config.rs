use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pinecone: PineconeConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub query: QueryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PineconeConfig {
    pub index: String,
    #[serde(default = "default_metric")]
    pub metric: Metric,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Control-plane base URL. Overridable for tests.
    #[serde(default = "default_pinecone_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Similarity metric of the index.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    Dotproduct,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::Dotproduct => "dotproduct",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            "dotproduct" => Ok(Metric::Dotproduct),
            other => anyhow::bail!(
                "Unknown metric: '{}'. Must be cosine, euclidean, or dotproduct.",
                other
            ),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Embedding API base URL. Overridable for tests.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Fixed anchor for resolving relative time expressions ("last year").
    /// Defaults to today's UTC date when unset.
    #[serde(default)]
    pub reference_date: Option<String>,
    /// Gemini API base URL. Overridable for tests.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            timeout_secs: default_timeout_secs(),
            reference_date: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    pub csv_path: std::path::PathBuf,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: std::path::PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

fn default_metric() -> Metric {
    Metric::Cosine
}
fn default_dimension() -> usize {
    384
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_pinecone_base_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_artifacts_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("./artifacts")
}
fn default_top_k() -> usize {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.pinecone.index.trim().is_empty() {
        anyhow::bail!("pinecone.index must not be empty");
    }

    if config.pinecone.dimension == 0 {
        anyhow::bail!("pinecone.dimension must be > 0");
    }

    if config.embedding.dims != config.pinecone.dimension {
        anyhow::bail!(
            "embedding.dims ({}) must match pinecone.dimension ({})",
            config.embedding.dims,
            config.pinecone.dimension
        );
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be gemini or openai.",
            other
        ),
    }

    if !(1..=10).contains(&config.query.top_k) {
        anyhow::bail!("query.top_k must be between 1 and 10");
    }

    if let Some(ref raw) = config.llm.reference_date {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("llm.reference_date must be YYYY-MM-DD, got '{}'", raw))?;
    }

    Ok(config)
}
