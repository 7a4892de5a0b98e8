//! In-memory [`VectorStore`] implementation for tests and throwaway runs.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over all stored vectors.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::filter::EntryFilter;
use crate::models::{EmbeddedEntry, ScoredEntry};

use super::{sort_scored, VectorStore};

/// In-memory store. Contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, EmbeddedEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, EmbeddedEntry>>> {
        self.entries
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, EmbeddedEntry>>> {
        self.entries
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, entries: &[EmbeddedEntry]) -> Result<()> {
        // A single write guard makes the whole batch visible at once.
        let mut map = self.write()?;
        for entry in entries {
            map.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: &EntryFilter,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>> {
        if limit == 0 || filter.is_unsatisfiable() {
            return Ok(Vec::new());
        }
        let map = self.read()?;
        let mut scored: Vec<ScoredEntry> = map
            .values()
            .filter(|e| filter.matches(&e.metadata))
            .map(|e| ScoredEntry {
                score: cosine_similarity(vector, &e.vector),
                entry: e.clone().without_vector(),
            })
            .collect();
        sort_scored(&mut scored);
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_all(&self, filter: &EntryFilter) -> Result<Vec<EmbeddedEntry>> {
        let map = self.read()?;
        let mut entries: Vec<EmbeddedEntry> = map
            .values()
            .filter(|e| filter.matches(&e.metadata))
            .map(|e| e.clone().without_vector())
            .collect();
        entries.sort_by(|a, b| {
            a.metadata
                .timestamp
                .cmp(&b.metadata.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(entries)
    }

    async fn get(&self, id: &str) -> Result<Option<EmbeddedEntry>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut map = self.write()?;
        Ok(ids.iter().filter(|id| map.remove(*id).is_some()).count())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
