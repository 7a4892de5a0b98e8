//! Wiring from configuration to a ready [`VectorStoreAdapter`] and
//! [`QueryPipeline`].
//!
//! | `store.backend` | Store | Checkpoints |
//! |-----------------|-------|-------------|
//! | `sqlite` | [`SqliteStore`] on `db.path` | same database |
//! | `memory` | [`InMemoryStore`], loaded from `ingest.paths` on open | none |
//! | `qdrant` | `QdrantStore` (feature `qdrant`) | SQLite at `db.path` |

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use log_rag_core::adapter::VectorStoreAdapter;
use log_rag_core::pipeline::QueryPipeline;
use log_rag_core::store::memory::InMemoryStore;
use log_rag_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::ingest::{self, IngestOptions};
use crate::llm::create_model;
use crate::migrate::migrate_pool;
use crate::progress::NoProgress;
use crate::sqlite_store::SqliteStore;

pub struct Backend {
    pub adapter: VectorStoreAdapter,
    /// Checkpoint database; `None` for the memory backend.
    pub pool: Option<SqlitePool>,
}

impl Backend {
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;

        let (store, pool): (Arc<dyn VectorStore>, Option<SqlitePool>) =
            match config.store.backend.as_str() {
                "sqlite" => {
                    let pool = open_pool(config).await?;
                    let store = SqliteStore::new(pool.clone(), embedder.model_name());
                    (Arc::new(store), Some(pool))
                }
                "memory" => (Arc::new(InMemoryStore::new()), None),
                #[cfg(feature = "qdrant")]
                "qdrant" => {
                    if embedder.dims() == 0 {
                        bail!("store.backend = \"qdrant\" needs an enabled embedding provider");
                    }
                    let store = crate::qdrant_store::QdrantStore::connect(
                        &config.store.qdrant_url,
                        &config.store.collection,
                        embedder.dims(),
                    )
                    .await?;
                    let pool = open_pool(config).await?;
                    (Arc::new(store), Some(pool))
                }
                #[cfg(not(feature = "qdrant"))]
                "qdrant" => bail!("The qdrant backend requires building with --features qdrant"),
                other => bail!("Unknown store backend: {}", other),
            };

        tracing::debug!(
            store = store.name(),
            embedder = embedder.model_name(),
            "backend opened"
        );
        let adapter =
            VectorStoreAdapter::new(store, embedder).with_batch_size(config.embedding.batch_size);
        Ok(Self { adapter, pool })
    }

    /// Open the backend; the memory backend is filled from `ingest.paths`
    /// so that read commands have something to read.
    pub async fn open_loaded(config: &Config) -> Result<Self> {
        let backend = Self::open(config).await?;
        if backend.pool.is_none() && !config.ingest.paths.is_empty() {
            let report = ingest::ingest_paths(
                &backend,
                config,
                &config.ingest.paths,
                &IngestOptions::default(),
                &NoProgress,
            )
            .await?;
            tracing::info!(
                records = report.records,
                files = report.files,
                "loaded logs into memory store"
            );
        }
        Ok(backend)
    }

    pub fn pipeline(&self, config: &Config) -> Result<QueryPipeline> {
        let llm = create_model(&config.llm)?;
        Ok(QueryPipeline::new(self.adapter.clone(), llm)
            .with_top_k(config.retrieval.top_k)
            .with_filter_inference(config.retrieval.infer_filters))
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}

async fn open_pool(config: &Config) -> Result<SqlitePool> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    Ok(pool)
}
