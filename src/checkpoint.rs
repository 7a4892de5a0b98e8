//! Per-file ingest checkpoints in the `checkpoints` table.
//!
//! The key is `file:<absolute path>`; the cursor is a
//! [`Cursor`](crate::logfiles::Cursor) in its encoded form.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

use crate::logfiles::Cursor;

pub fn source_key(path: &Path) -> String {
    let abs = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file:{}", abs.display())
}

pub async fn get_checkpoint(pool: &SqlitePool, source: &str) -> Result<Option<Cursor>> {
    let result: Option<String> =
        sqlx::query_scalar("SELECT cursor FROM checkpoints WHERE source = ?")
            .bind(source)
            .fetch_optional(pool)
            .await?;

    Ok(result.and_then(|s| Cursor::decode(&s)))
}

pub async fn set_checkpoint(pool: &SqlitePool, source: &str, cursor: Cursor) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO checkpoints (source, cursor, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(source) DO UPDATE SET cursor = excluded.cursor, updated_at = excluded.updated_at
        "#,
    )
    .bind(source)
    .bind(cursor.encode())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count_checkpoints(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM checkpoints")
        .fetch_one(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn set_then_get() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();

        assert_eq!(get_checkpoint(&pool, "file:/a.log").await.unwrap(), None);
        let c = Cursor { offset: 42, line: 3 };
        set_checkpoint(&pool, "file:/a.log", c).await.unwrap();
        set_checkpoint(&pool, "file:/a.log", Cursor { offset: 50, line: 4 })
            .await
            .unwrap();
        assert_eq!(
            get_checkpoint(&pool, "file:/a.log").await.unwrap(),
            Some(Cursor { offset: 50, line: 4 })
        );
        assert_eq!(count_checkpoints(&pool).await.unwrap(), 1);
    }
}
