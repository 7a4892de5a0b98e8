//! Storage abstraction for embedded log entries.
//!
//! The [`VectorStore`] trait defines the operations the adapter needs from
//! a vector database, enabling pluggable backends (SQLite, in-memory,
//! Qdrant).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::filter::EntryFilter;
use crate::models::{EmbeddedEntry, ScoredEntry};

/// Abstract vector database for embedded log entries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace entries by id, all-or-nothing |
/// | [`query`](VectorStore::query) | Top-k cosine similarity search under a metadata filter |
/// | [`list_all`](VectorStore::list_all) | Every entry matching a filter, oldest first |
/// | [`get`](VectorStore::get) | Fetch one entry by id |
/// | [`delete`](VectorStore::delete) | Remove entries by id |
/// | [`count`](VectorStore::count) | Number of stored entries |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs and stats output.
    fn name(&self) -> &'static str;

    /// Insert or replace every entry in `entries`.
    ///
    /// Either all entries become visible or none do. Ids are unique within
    /// the slice.
    async fn upsert(&self, entries: &[EmbeddedEntry]) -> Result<()>;

    /// Return at most `limit` entries matching `filter`, ordered by
    /// descending cosine similarity to `vector`. Ties are broken by id.
    async fn query(
        &self,
        vector: &[f32],
        filter: &EntryFilter,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>>;

    /// Every entry matching `filter`, ordered by timestamp then id.
    /// Returned entries carry no vector.
    async fn list_all(&self, filter: &EntryFilter) -> Result<Vec<EmbeddedEntry>>;

    /// Fetch a single entry. The vector is included when the backend
    /// returns it.
    async fn get(&self, id: &str) -> Result<Option<EmbeddedEntry>>;

    /// Delete entries by id, returning how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}

/// Order scored entries by descending score, then ascending id.
pub fn sort_scored(entries: &mut [ScoredEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
}
