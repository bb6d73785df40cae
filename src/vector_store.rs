//! Pinecone client: control-plane index management and data-plane
//! upsert/query.
//!
//! The control plane (`https://api.pinecone.io`) lists, creates, and
//! describes indexes; the data plane lives on the per-index host the
//! control plane reports. Every call is a single blocking round trip —
//! a non-success status or a failing item fails the whole operation.
//!
//! The API key comes from the `PINECONE_API_KEY` environment variable.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{Metric, PineconeConfig};
use crate::models::{QueryMatch, VectorEntry};

/// How often and how long to poll a freshly created index for readiness.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_POLL_ATTEMPTS: u32 = 30;

/// Control-plane client.
pub struct PineconeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Data-plane handle for one index.
#[derive(Debug)]
pub struct IndexHandle {
    http: reqwest::Client,
    data_url: String,
    api_key: String,
}

/// An index as described by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub host: String,
    #[serde(default)]
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: CreateIndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct CreateIndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorEntry],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a serde_json::Value>,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

impl PineconeClient {
    /// Build a client from config, reading `PINECONE_API_KEY`.
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;
        if api_key.trim().is_empty() {
            bail!("PINECONE_API_KEY environment variable is empty");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let response = self
            .http
            .get(format!("{}/indexes", self.base_url))
            .header("Api-Key", &self.api_key)
            .send()
            .await?;
        let list: IndexList = check(response).await?.json().await
            .context("Invalid index list response")?;
        Ok(list.indexes)
    }

    pub async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let response = self
            .http
            .get(format!("{}/indexes/{}", self.base_url, name))
            .header("Api-Key", &self.api_key)
            .send()
            .await?;
        check(response).await?.json().await
            .context("Invalid index description response")
    }

    /// Provision a serverless index. Remote side effect; the index may
    /// take a little while to become ready after this returns.
    pub async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        metric: Metric,
        cloud: &str,
        region: &str,
    ) -> Result<IndexDescription> {
        let body = CreateIndexRequest {
            name,
            dimension,
            metric: metric.as_str(),
            spec: CreateIndexSpec {
                serverless: ServerlessSpec { cloud, region },
            },
        };
        let response = self
            .http
            .post(format!("{}/indexes", self.base_url))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        check(response).await?.json().await
            .context("Invalid create index response")
    }

    /// Reuse or create the named index and return a data-plane handle.
    ///
    /// An existing index is only reused when its dimension and metric
    /// match the requested ones; a mismatch is a hard error rather than
    /// a latent one surfaced by some later upsert.
    pub async fn ensure_index(&self, config: &PineconeConfig) -> Result<IndexHandle> {
        let existing = self
            .list_indexes()
            .await?
            .into_iter()
            .find(|idx| idx.name == config.index);

        let description = match existing {
            Some(idx) => {
                if idx.dimension != config.dimension {
                    bail!(
                        "Index '{}' exists with dimension {}, requested {}",
                        idx.name,
                        idx.dimension,
                        config.dimension
                    );
                }
                if idx.metric != config.metric.as_str() {
                    bail!(
                        "Index '{}' exists with metric '{}', requested '{}'",
                        idx.name,
                        idx.metric,
                        config.metric
                    );
                }
                println!("Index '{}' already exists.", idx.name);
                idx
            }
            None => {
                let created = self
                    .create_index(
                        &config.index,
                        config.dimension,
                        config.metric,
                        &config.cloud,
                        &config.region,
                    )
                    .await?;
                println!(
                    "Index '{}' created with dimension={} and metric='{}'.",
                    created.name, created.dimension, created.metric
                );
                self.wait_until_ready(&created).await?
            }
        };

        Ok(self.index_handle(&description))
    }

    /// Data-plane handle for an already described index.
    pub fn index_handle(&self, description: &IndexDescription) -> IndexHandle {
        // The control plane reports a bare hostname.
        let data_url = if description.host.contains("://") {
            description.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", description.host)
        };
        IndexHandle {
            http: self.http.clone(),
            data_url,
            api_key: self.api_key.clone(),
        }
    }

    async fn wait_until_ready(&self, created: &IndexDescription) -> Result<IndexDescription> {
        if created.status.ready {
            return Ok(created.clone());
        }
        for _ in 0..READY_POLL_ATTEMPTS {
            tokio::time::sleep(READY_POLL_INTERVAL).await;
            let described = self.describe_index(&created.name).await?;
            if described.status.ready {
                return Ok(described);
            }
        }
        bail!(
            "Index '{}' did not become ready (last state: '{}')",
            created.name,
            created.status.state
        )
    }
}

impl IndexHandle {
    /// Insert-or-replace entries by id. One call, no batching; a failing
    /// item fails the whole call.
    pub async fn upsert(&self, entries: &[VectorEntry]) -> Result<u64> {
        let body = UpsertRequest { vectors: entries };
        let response = self
            .http
            .post(format!("{}/vectors/upsert", self.data_url))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: UpsertResponse = check(response).await?.json().await
            .context("Invalid upsert response")?;
        Ok(parsed.upserted_count)
    }

    /// Similarity query with an optional metadata filter.
    ///
    /// Returns up to `top_k` matches ordered by the index's metric. An
    /// empty match list is a valid, non-error outcome. An empty filter
    /// object is treated as "no filter".
    pub async fn query(
        &self,
        vector: &[f32],
        filter: &serde_json::Value,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let has_constraints = filter.as_object().map(|o| !o.is_empty()).unwrap_or(false);
        let body = QueryRequest {
            vector,
            top_k,
            filter: has_constraints.then_some(filter),
            include_metadata: true,
        };
        let response = self
            .http
            .post(format!("{}/query", self.data_url))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: QueryResponse = check(response).await?.json().await
            .context("Invalid query response")?;
        Ok(parsed.matches)
    }
}

/// Turn a non-success response into an error carrying the body text.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body_text = response.text().await.unwrap_or_default();
    bail!("Pinecone API error {}: {}", status, body_text)
}
