//! Qdrant-backed [`VectorStore`] (feature `qdrant`).
//!
//! Each entry is a point whose id is the entry's UUID. The payload carries
//! `text`, `timestamp`, `timestamp_ms`, `level` and `component`; an
//! [`EntryFilter`] becomes a Qdrant `Filter` with a range condition on
//! `timestamp_ms` and a keyword match on `level`.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CountPointsBuilder, CreateCollectionBuilder,
    DeletePointsBuilder, Distance, Filter, GetPointsBuilder, PointId, PointStruct, PointsIdsList,
    Range, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map as JsonMap, Value as JsonValue};

use log_rag_core::filter::EntryFilter;
use log_rag_core::models::{EmbeddedEntry, EntryMetadata, LogLevel, ScoredEntry};
use log_rag_core::store::{sort_scored, VectorStore};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const SCROLL_PAGE: u32 = 256;

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Connect and create the collection (cosine distance, `dims` wide) if
    /// it does not exist yet.
    pub async fn connect(url: &str, collection: &str, dims: usize) -> Result<Self> {
        tracing::info!(url, collection, "connecting to Qdrant");
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Qdrant client build failed: {}", e))?;

        let store = Self {
            client,
            collection: collection.to_string(),
        };
        store.ensure_collection(dims).await?;
        Ok(store)
    }

    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        if !self.client.collection_exists(&self.collection).await? {
            tracing::info!(collection = %self.collection, dims, "creating Qdrant collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dims as u64, Distance::Cosine)),
                )
                .await?;
        }
        Ok(())
    }
}

fn to_qdrant_filter(filter: &EntryFilter) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(time) = &filter.time {
        if !time.is_open() {
            conditions.push(Condition::range(
                "timestamp_ms",
                Range {
                    gte: time.start_millis().map(|v| v as f64),
                    lte: time.end_millis().map(|v| v as f64),
                    ..Default::default()
                },
            ));
        }
    }
    if !filter.levels.is_empty() {
        let levels: Vec<String> = filter.levels.iter().map(|l| l.as_str().to_string()).collect();
        conditions.push(Condition::matches("level", levels));
    }
    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

fn payload_str<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a String> {
    payload.get(key).and_then(|v| v.as_str())
}

fn point_id_string(id: &Option<PointId>) -> Option<String> {
    match id.as_ref()?.point_id_options.as_ref()? {
        PointIdOptions::Uuid(uuid) => Some(uuid.clone()),
        PointIdOptions::Num(num) => Some(num.to_string()),
    }
}

fn payload_to_entry(id: String, payload: &HashMap<String, Value>) -> Result<EmbeddedEntry> {
    let ts = payload_str(payload, "timestamp")
        .ok_or_else(|| anyhow::anyhow!("Qdrant point {} has no timestamp", id))?;
    let timestamp = NaiveDateTime::parse_from_str(ts, TS_FORMAT)?;
    let level: LogLevel = payload_str(payload, "level")
        .ok_or_else(|| anyhow::anyhow!("Qdrant point {} has no level", id))?
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    Ok(EmbeddedEntry {
        text: payload_str(payload, "text").cloned().unwrap_or_default(),
        metadata: EntryMetadata {
            timestamp,
            level,
            component: payload_str(payload, "component").cloned(),
        },
        vector: Vec::new(),
        id,
    })
}

fn entry_to_point(entry: &EmbeddedEntry) -> PointStruct {
    let meta = &entry.metadata;
    let mut payload = JsonMap::new();
    payload.insert("text".to_string(), JsonValue::String(entry.text.clone()));
    payload.insert(
        "timestamp".to_string(),
        JsonValue::String(meta.timestamp.format(TS_FORMAT).to_string()),
    );
    payload.insert(
        "timestamp_ms".to_string(),
        JsonValue::from(meta.timestamp_millis()),
    );
    payload.insert(
        "level".to_string(),
        JsonValue::String(meta.level.as_str().to_string()),
    );
    if let Some(component) = &meta.component {
        payload.insert("component".to_string(), JsonValue::String(component.clone()));
    }
    PointStruct::new(entry.id.clone(), entry.vector.clone(), payload)
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn upsert(&self, entries: &[EmbeddedEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let points: Vec<PointStruct> = entries.iter().map(entry_to_point).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await?;
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
        let mut builder = SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit as u64)
            .with_payload(true);
        if let Some(f) = to_qdrant_filter(filter) {
            builder = builder.filter(f);
        }
        let response = self.client.search_points(builder).await?;

        let mut scored = Vec::with_capacity(response.result.len());
        for point in &response.result {
            let Some(id) = point_id_string(&point.id) else {
                continue;
            };
            scored.push(ScoredEntry {
                entry: payload_to_entry(id, &point.payload)?,
                score: point.score,
            });
        }
        sort_scored(&mut scored);
        Ok(scored)
    }

    async fn list_all(&self, filter: &EntryFilter) -> Result<Vec<EmbeddedEntry>> {
        if filter.is_unsatisfiable() {
            return Ok(Vec::new());
        }
        let qfilter = to_qdrant_filter(filter);
        let mut entries = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_PAGE)
                .with_payload(true);
            if let Some(f) = &qfilter {
                builder = builder.filter(f.clone());
            }
            if let Some(off) = &offset {
                builder = builder.offset(off.clone());
            }

            let result = self.client.scroll(builder).await?;
            for point in &result.result {
                if let Some(id) = point_id_string(&point.id) {
                    entries.push(payload_to_entry(id, &point.payload)?);
                }
            }

            offset = result.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        entries.sort_by(|a, b| {
            a.metadata
                .timestamp
                .cmp(&b.metadata.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(entries)
    }

    async fn get(&self, id: &str) -> Result<Option<EmbeddedEntry>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![PointId::from(id.to_string())])
                    .with_payload(true),
            )
            .await?;
        response
            .result
            .first()
            .map(|p| payload_to_entry(id.to_string(), &p.payload))
            .transpose()
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();
        let existing = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection, point_ids.clone()))
            .await?
            .result
            .len();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await?;
        Ok(existing)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
