//! Vector store adapter: records in, embedded entries out.
//!
//! [`VectorStoreAdapter`] sits between the ingestor and a [`VectorStore`].
//! It turns [`LogRecord`]s into [`EmbeddedEntry`]s by asking an
//! [`EmbeddingProvider`] for vectors, and hands similarity queries to the
//! store.
//!
//! # Atomicity
//!
//! [`add`](VectorStoreAdapter::add) embeds every batch before writing
//! anything. If any embedding request fails the call returns
//! [`RagError::ServiceUnavailable`] and the store is untouched; otherwise
//! the entries are written with a single [`VectorStore::upsert`], which
//! backends apply all-or-nothing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::filter::EntryFilter;
use crate::models::{EmbeddedEntry, LogRecord, ScoredEntry};
use crate::store::VectorStore;

/// Default number of texts per embedding request.
pub const DEFAULT_EMBED_BATCH: usize = 64;

/// Outcome of one [`VectorStoreAdapter::add`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddSummary {
    /// Records passed in.
    pub records: usize,
    /// Distinct entries written (duplicate lines collapse to one).
    pub entries_written: usize,
    /// Embedding requests issued.
    pub batches: usize,
    /// Blank or whitespace-only lines, which are neither embedded nor stored.
    pub skipped_blank: usize,
}

#[derive(Clone)]
pub struct VectorStoreAdapter {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl VectorStoreAdapter {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_EMBED_BATCH,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embed and store `records`.
    ///
    /// Records with identical raw lines share an id; the last one in the
    /// slice wins. Blank lines are counted in
    /// [`AddSummary::skipped_blank`] and dropped, since embedding services
    /// reject empty input. Nothing is written unless every embedding
    /// succeeded.
    pub async fn add(&self, records: &[LogRecord]) -> Result<AddSummary, RagError> {
        let mut summary = AddSummary {
            records: records.len(),
            ..AddSummary::default()
        };
        if records.is_empty() {
            return Ok(summary);
        }

        // Dedupe by id, keeping first-seen position and last-seen record.
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, &LogRecord> = HashMap::new();
        for record in records {
            if record.raw_line.trim().is_empty() {
                summary.skipped_blank += 1;
                continue;
            }
            let id = record.entry_id();
            if latest.insert(id.clone(), record).is_none() {
                order.push(id);
            }
        }
        let unique: Vec<&LogRecord> = order.iter().map(|id| latest[id]).collect();
        if unique.is_empty() {
            return Ok(summary);
        }

        let mut entries = Vec::with_capacity(unique.len());
        for batch in unique.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.raw_line.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(RagError::embedding)?;
            summary.batches += 1;

            if vectors.len() != batch.len() {
                return Err(RagError::embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            tracing::debug!(batch = summary.batches, size = batch.len(), "embedded batch");

            for (record, vector) in batch.iter().zip(vectors) {
                entries.push(EmbeddedEntry::from_record(record, vector));
            }
        }

        self.store.upsert(&entries).await.map_err(RagError::store)?;
        summary.entries_written = entries.len();
        tracing::debug!(
            records = summary.records,
            written = summary.entries_written,
            store = self.store.name(),
            "stored entries"
        );
        Ok(summary)
    }

    /// Top-`k` entries most similar to `vector` that satisfy `filter`.
    ///
    /// An unsatisfiable filter (inverted time range) yields an empty result
    /// without touching the store.
    pub async fn query(
        &self,
        vector: &[f32],
        filter: &EntryFilter,
        k: usize,
    ) -> Result<Vec<ScoredEntry>, RagError> {
        if k == 0 || filter.is_unsatisfiable() {
            return Ok(Vec::new());
        }
        self.store
            .query(vector, filter, k)
            .await
            .map_err(RagError::store)
    }

    pub async fn list_all(&self, filter: &EntryFilter) -> Result<Vec<EmbeddedEntry>, RagError> {
        if filter.is_unsatisfiable() {
            return Ok(Vec::new());
        }
        self.store.list_all(filter).await.map_err(RagError::store)
    }

    pub async fn get(&self, id: &str) -> Result<Option<EmbeddedEntry>, RagError> {
        self.store.get(id).await.map_err(RagError::store)
    }

    pub async fn delete(&self, ids: &[String]) -> Result<usize, RagError> {
        self.store.delete(ids).await.map_err(RagError::store)
    }

    pub async fn count(&self) -> Result<usize, RagError> {
        self.store.count().await.map_err(RagError::store)
    }
}
