//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and two remote backends:
//! - **gemini** — the Gemini `batchEmbedContents` API with
//!   `outputDimensionality` pinned to the configured dimension.
//! - **openai** — the OpenAI `POST /v1/embeddings` API.
//!
//! Both are treated as pure functions from text to a fixed-length vector:
//! one attempt per call, no retry, no caching. A non-success status or a
//! response of the wrong shape is a fatal error for the operation.
//!
//! API keys come from the environment (`GEMINI_API_KEY` /
//! `OPENAI_API_KEY`) and are checked before any request is made.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Trait for embedding providers.
///
/// The actual embedding computation is performed by [`embed_texts`]
/// (kept as a free function due to async trait limitations).
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Returns the model identifier (e.g. `"gemini-embedding-001"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
}

#[derive(Debug)]
struct RemoteProvider {
    model: String,
    dims: usize,
}

impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Create the configured [`EmbeddingProvider`].
///
/// Fails fast when the provider name is unknown or the matching API key
/// environment variable is missing, so misconfiguration surfaces before
/// any pipeline work starts.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let key_var = match config.provider.as_str() {
        "gemini" => "GEMINI_API_KEY",
        "openai" => "OPENAI_API_KEY",
        other => bail!("Unknown embedding provider: {}", other),
    };
    if std::env::var(key_var).map(|v| v.trim().is_empty()).unwrap_or(true) {
        bail!("{} environment variable not set", key_var);
    }
    Ok(Box::new(RemoteProvider {
        model: config.model.clone(),
        dims: config.dims,
    }))
}

/// Embed a batch of texts using the configured provider.
///
/// Returns one vector per input text, in input order. Errors if the
/// response count or any vector's dimensionality disagrees with the
/// configuration.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = match config.provider.as_str() {
        "gemini" => embed_gemini(config, texts).await?,
        "openai" => embed_openai(config, texts).await?,
        other => bail!("Unknown embedding provider: {}", other),
    };

    if embeddings.len() != texts.len() {
        bail!(
            "Embedding response count mismatch: sent {} texts, got {} vectors",
            texts.len(),
            embeddings.len()
        );
    }
    for vec in &embeddings {
        if vec.len() != config.dims {
            bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                config.dims,
                vec.len()
            );
        }
    }

    Ok(embeddings)
}

/// Embed a single query text.
///
/// Convenience wrapper around [`embed_texts`] for embedding the semantic
/// phrase of a search.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

// ============ Gemini ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

async fn embed_gemini(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var("GEMINI_API_KEY").map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

    let base = config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
    let url = format!(
        "{}/models/{}:batchEmbedContents?key={}",
        base, config.model, api_key
    );

    let body = GeminiBatchRequest {
        requests: texts
            .iter()
            .map(|text| GeminiEmbedRequest {
                model: format!("models/{}", config.model),
                content: GeminiContent {
                    parts: vec![GeminiPart { text: text.clone() }],
                },
                output_dimensionality: config.dims,
            })
            .collect(),
    };

    let client = http_client(config.timeout_secs)?;
    let response = client.post(&url).json(&body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Gemini embedding API error {}: {}", status, body_text);
    }

    let parsed: GeminiBatchResponse = response
        .json()
        .await
        .context("Invalid Gemini embedding response")?;

    Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
}

// ============ OpenAI ============

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let base = config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
    let url = format!("{}/v1/embeddings", base);

    let body = serde_json::json!({
        "model": config.model,
        "input": texts,
        "dimensions": config.dims,
    });

    let client = http_client(config.timeout_secs)?;
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("OpenAI embedding API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response
        .json()
        .await
        .context("Invalid OpenAI embedding response")?;
    parse_openai_response(&json)
}

/// Extract the `data[].embedding` arrays from an OpenAI response.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "gemini".to_string(),
            model: "gemini-embedding-001".to_string(),
            dims: 4,
            batch_size: 64,
            timeout_secs: 5,
            base_url: Some(base_url.to_string()),
        }
    }

    fn gemini_response(count: usize, dims: usize) -> serde_json::Value {
        let values: Vec<f32> = (0..dims).map(|i| i as f32 / dims as f32).collect();
        serde_json::json!({
            "embeddings": (0..count)
                .map(|_| serde_json::json!({ "values": values }))
                .collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn gemini_batch_returns_vectors_in_order() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .and(path("/models/gemini-embedding-001:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(2, 4)))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let texts = vec!["ML trends".to_string(), "vector search".to_string()];
        let result = embed_texts(&config, &texts).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 4);
    }

    #[tokio::test]
    async fn gemini_error_status_propagates() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let err = embed_texts(&config, &["hi".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("Gemini embedding API error"));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(1, 3)))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let err = embed_texts(&config, &["hi".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        std::env::set_var("GEMINI_API_KEY", "test-key");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(1, 4)))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embed_texts(&config, &texts).await.unwrap_err();
        assert!(err.to_string().contains("count mismatch"));
    }

    #[tokio::test]
    async fn empty_input_skips_the_api() {
        // No mock server at all — an API call would fail.
        let config = test_config("http://127.0.0.1:1");
        std::env::set_var("GEMINI_API_KEY", "test-key");
        let result = embed_texts(&config, &[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn parse_openai_response_extracts_vectors() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.1, 0.2] },
                { "embedding": [0.3, 0.4] }
            ]
        });
        let parsed = parse_openai_response(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], vec![0.3f32, 0.4f32]);
    }

    #[test]
    fn create_provider_requires_api_key() {
        std::env::remove_var("OPENAI_API_KEY");
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn create_provider_rejects_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }
}
