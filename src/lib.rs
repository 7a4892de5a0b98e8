//! # log-rag
//!
//! Ask natural-language questions about application log files.
//!
//! Log lines are parsed into timestamped records, embedded, and stored in a
//! vector store. A question is embedded the same way, the closest entries
//! inside an optional time window are retrieved, and a language model
//! answers from those entries. The answer always carries the entries it was
//! built from.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌──────────────────┐
//! │ Log files │──▶│ LogIngestor │──▶│ VectorStore      │
//! │ (watch)   │   │ parse+embed │   │ SQLite / Qdrant  │
//! └───────────┘   └─────────────┘   └────────┬─────────┘
//!                                            │
//!                                   ┌────────▼─────────┐
//!                                   │ QueryPipeline    │──▶ LanguageModel
//!                                   └────────┬─────────┘
//!                          ┌─────────────────┤
//!                          ▼                 ▼
//!                     ┌──────────┐     ┌──────────┐
//!                     │   CLI    │     │   HTTP   │
//!                     │  (logq)  │     │  (axum)  │
//!                     └──────────┘     └──────────┘
//! ```
//!
//! The parsing, retrieval, and prompt logic lives in the `log-rag-core`
//! crate; this crate wires it to configuration, SQLite, HTTP providers,
//! and the command line.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`runtime`] | Builds the store, embedder, and pipeline from config |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`sqlite_store`] | Default persistent vector store |
//! | `qdrant_store` | Qdrant vector store (feature `qdrant`) |
//! | [`embedding`] | Embedding providers (Ollama, OpenAI, local, hash) |
//! | [`llm`] | Language models (Ollama, OpenAI-compatible) |
//! | [`http`] | Shared JSON POST with retry |
//! | [`logfiles`] / [`checkpoint`] | File discovery and incremental reads |
//! | [`ingest`] / [`watch`] | Ingestion commands |
//! | [`ask`] / [`list`] / [`entries`] / [`stats`] | Query and inspection commands |
//! | [`server`] | HTTP API |
//! | [`progress`] | Ingest progress on stderr |

pub mod ask;
pub mod checkpoint;
pub mod config;
pub mod db;
pub mod embedding;
pub mod entries;
pub mod http;
pub mod ingest;
pub mod list;
pub mod llm;
pub mod logfiles;
pub mod migrate;
pub mod progress;
#[cfg(feature = "qdrant")]
pub mod qdrant_store;
pub mod runtime;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod watch;
