//! # pinequery
//!
//! A natural-language query agent for a Pinecone vector index.
//!
//! pinequery converts a free-text question into a structured metadata
//! filter plus a short semantic phrase (via Gemini), embeds the phrase,
//! and runs a filtered similarity query against a hosted vector index.
//! A one-shot ingest path loads a CSV of articles, embeds their titles,
//! and upserts the results.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌───────────┐
//! │   CSV    │──▶│ Normalize │──▶│  Embed    │──▶│ Pinecone  │
//! │ articles │   │ + dates   │   │  titles   │   │  upsert   │
//! └──────────┘   └───────────┘   └──────────┘   └───────────┘
//!
//! ┌──────────┐   ┌─────────────┐   ┌──────────┐   ┌───────────┐
//! │ question │──▶│ Interpreter  │──▶│  Embed    │──▶│ Pinecone  │
//! │  (text)  │   │ filter+query│   │  phrase   │   │   query   │
//! └──────────┘   └─────────────┘   └──────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export PINECONE_API_KEY=...
//! export GEMINI_API_KEY=...
//! pinequery ingest --csv ./data/articles.csv
//! pinequery query "Show me articles by Alice Zhang from last year about machine learning"
//! pinequery serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | CSV row normalization |
//! | [`dates`] | Published-date decomposition |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`interpreter`] | Natural-language query interpretation |
//! | [`vector_store`] | Pinecone control/data-plane client |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`query`] | Query orchestration |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod dates;
pub mod embedding;
pub mod ingest;
pub mod interpreter;
pub mod models;
pub mod normalize;
pub mod query;
pub mod server;
pub mod vector_store;
