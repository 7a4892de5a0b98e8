//! SQLite-backed [`VectorStore`] implementation.
//!
//! Entries live in the `entries` table (see [`crate::migrate`]). Metadata
//! filters become a SQL `WHERE` clause over `timestamp_ms` and `level`;
//! similarity is brute-force cosine over the rows that pass it.
//!
//! Every row records the embedding model and dimension it was written with.
//! Similarity queries only consider rows from this store's model at the
//! query vector's dimension; vectors from another model are not comparable.
//! Re-ingest with `--full` after switching models.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Arguments, Row, SqlitePool};

use log_rag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use log_rag_core::filter::EntryFilter;
use log_rag_core::models::{EmbeddedEntry, EntryMetadata, LogLevel, ScoredEntry};
use log_rag_core::store::{sort_scored, VectorStore};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteStore {
    /// `model` is recorded next to every vector written through this store.
    pub fn new(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Rows whose vectors were not written by this model at `dims`.
    async fn foreign_vectors(&self, dims: usize) -> Result<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE model != ? OR dims != ?")
                .bind(&self.model)
                .bind(dims as i64)
                .fetch_one(&self.pool)
                .await?;
        Ok(n)
    }
}

/// Build `WHERE ...` (or an empty string) plus bound arguments for `filter`,
/// optionally restricted to vectors written by `model` with `dims` values.
fn where_clause<'q>(
    filter: &EntryFilter,
    vectors: Option<(&str, usize)>,
) -> Result<(String, SqliteArguments<'q>)> {
    let mut clauses = Vec::new();
    let mut args = SqliteArguments::default();

    if let Some((model, dims)) = vectors {
        clauses.push("model = ? AND dims = ?".to_string());
        args.add(model.to_string()).map_err(|e| anyhow::anyhow!(e))?;
        args.add(dims as i64).map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(time) = &filter.time {
        if let Some(start) = time.start_millis() {
            clauses.push("timestamp_ms >= ?".to_string());
            args.add(start).map_err(|e| anyhow::anyhow!(e))?;
        }
        if let Some(end) = time.end_millis() {
            clauses.push("timestamp_ms <= ?".to_string());
            args.add(end).map_err(|e| anyhow::anyhow!(e))?;
        }
    }
    if !filter.levels.is_empty() {
        let placeholders = vec!["?"; filter.levels.len()].join(", ");
        clauses.push(format!("level IN ({})", placeholders));
        for level in &filter.levels {
            args.add(level.as_str().to_string())
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    Ok((sql, args))
}

fn row_to_entry(row: &SqliteRow, with_vector: bool) -> Result<EmbeddedEntry> {
    let ts: String = row.get("timestamp");
    let level: String = row.get("level");
    let timestamp = NaiveDateTime::parse_from_str(&ts, TS_FORMAT)
        .with_context(|| format!("Corrupt timestamp in entries table: {}", ts))?;
    let level: LogLevel = level
        .parse()
        .map_err(|e: String| anyhow::anyhow!("Corrupt level in entries table: {}", e))?;
    let vector = if with_vector {
        let blob: Vec<u8> = row.get("embedding");
        blob_to_vec(&blob)
    } else {
        Vec::new()
    };

    Ok(EmbeddedEntry {
        id: row.get("id"),
        vector,
        metadata: EntryMetadata {
            timestamp,
            level,
            component: row.get("component"),
        },
        text: row.get("text"),
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn upsert(&self, entries: &[EmbeddedEntry]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let meta = &entry.metadata;
            sqlx::query(
                r#"
                INSERT INTO entries (id, timestamp_ms, timestamp, level, component, text,
                                     embedding, model, dims, ingested_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    timestamp_ms = excluded.timestamp_ms,
                    timestamp = excluded.timestamp,
                    level = excluded.level,
                    component = excluded.component,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims,
                    ingested_at = excluded.ingested_at
                "#,
            )
            .bind(&entry.id)
            .bind(meta.timestamp_millis())
            .bind(meta.timestamp.format(TS_FORMAT).to_string())
            .bind(meta.level.as_str())
            .bind(&meta.component)
            .bind(&entry.text)
            .bind(vec_to_blob(&entry.vector))
            .bind(&self.model)
            .bind(entry.vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
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
        let (where_sql, args) = where_clause(filter, Some((self.model.as_str(), vector.len())))?;
        let sql = format!(
            "SELECT id, timestamp, level, component, text, embedding FROM entries {}",
            where_sql
        );
        let rows = sqlx::query_with(&sql, args).fetch_all(&self.pool).await?;

        let foreign = self.foreign_vectors(vector.len()).await?;
        if foreign > 0 {
            tracing::warn!(
                model = %self.model,
                dims = vector.len(),
                skipped = foreign,
                "entries embedded with another model were left out of the search; run `logq ingest --full` to re-embed them"
            );
        }

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = row_to_entry(row, true)?;
            // Millisecond columns cannot express sub-millisecond bounds.
            if !filter.matches(&entry.metadata) {
                continue;
            }
            let score = cosine_similarity(vector, &entry.vector);
            scored.push(ScoredEntry {
                entry: entry.without_vector(),
                score,
            });
        }

        sort_scored(&mut scored);
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_all(&self, filter: &EntryFilter) -> Result<Vec<EmbeddedEntry>> {
        let (where_sql, args) = where_clause(filter, None)?;
        let sql = format!(
            "SELECT id, timestamp, level, component, text FROM entries {} \
             ORDER BY timestamp_ms ASC, timestamp ASC, id ASC",
            where_sql
        );
        let rows = sqlx::query_with(&sql, args).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = row_to_entry(row, false)?;
            if filter.matches(&entry.metadata) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn get(&self, id: &str) -> Result<Option<EmbeddedEntry>> {
        let row = sqlx::query(
            "SELECT id, timestamp, level, component, text, embedding FROM entries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_entry(&r, true)).transpose()
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for id in ids {
            removed += sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}
