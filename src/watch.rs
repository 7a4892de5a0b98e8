//! `logq watch`: follow log files and ingest appended lines.
//!
//! On start every file is caught up from its checkpoint. After that the
//! files are polled every `ingest.poll_interval_secs`; complete new lines
//! are ingested and ERROR/FATAL records are printed as alerts. Files that
//! appear under a watched directory are picked up on the next poll, and a
//! file that shrinks (rotation, truncation) is re-read from the start.

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use log_rag_core::models::LogRecord;

use crate::checkpoint::{get_checkpoint, set_checkpoint, source_key};
use crate::config::Config;
use crate::ingest::{ingest_file, IngestOptions};
use crate::logfiles::{self, Cursor};
use crate::progress::NoProgress;
use crate::runtime::Backend;

pub async fn run_watch(
    config: &Config,
    paths: Vec<PathBuf>,
    interval_secs: Option<u64>,
    max_polls: Option<u64>,
) -> Result<()> {
    let paths = if paths.is_empty() {
        config.ingest.paths.clone()
    } else {
        paths
    };
    let interval = Duration::from_secs(
        interval_secs
            .unwrap_or(config.ingest.poll_interval_secs)
            .max(1),
    );
    let backend = Backend::open(config).await?;
    let mut cursors: HashMap<PathBuf, Cursor> = HashMap::new();

    let catch_up = IngestOptions {
        complete_lines_only: true,
        ..IngestOptions::default()
    };
    let follow = IngestOptions {
        complete_lines_only: true,
        collect_alerts: true,
        ..IngestOptions::default()
    };

    let mut caught_up = 0usize;
    for path in logfiles::discover(&paths, &config.ingest)? {
        let start = load_cursor(&backend, &path).await?;
        let (report, next) =
            ingest_file(&backend, config, &path, start, &catch_up, &NoProgress).await?;
        caught_up += report.records;
        save_cursor(&backend, &path, next).await?;
        cursors.insert(path, next);
    }
    println!(
        "watching {} files every {}s ({} records caught up)",
        cursors.len(),
        interval.as_secs(),
        caught_up
    );

    let mut polls = 0u64;
    loop {
        if max_polls.is_some_and(|max| polls >= max) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("stopped");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
        polls += 1;

        for path in logfiles::discover(&paths, &config.ingest)? {
            let start = cursors.get(&path).copied().unwrap_or_default();
            let (report, next) =
                match ingest_file(&backend, config, &path, start, &follow, &NoProgress).await {
                    Ok(r) => r,
                    Err(e) => {
                        // Keep watching the other files; this one is retried next poll.
                        eprintln!("Warning: {}: {:#}", path.display(), e);
                        continue;
                    }
                };
            if next != start {
                save_cursor(&backend, &path, next).await?;
                cursors.insert(path.clone(), next);
            }
            if report.records > 0 {
                tracing::info!(path = %path.display(), records = report.records, "ingested new lines");
            }
            for record in &report.alerts {
                print_alert(&path, record);
            }
        }
    }

    backend.close().await;
    Ok(())
}

async fn load_cursor(backend: &Backend, path: &std::path::Path) -> Result<Cursor> {
    match &backend.pool {
        Some(pool) => Ok(get_checkpoint(pool, &source_key(path))
            .await?
            .unwrap_or_default()),
        None => Ok(Cursor::default()),
    }
}

async fn save_cursor(backend: &Backend, path: &std::path::Path, cursor: Cursor) -> Result<()> {
    if let Some(pool) = &backend.pool {
        set_checkpoint(pool, &source_key(path), cursor).await?;
    }
    Ok(())
}

fn print_alert(path: &std::path::Path, record: &LogRecord) {
    let component = record
        .component
        .as_deref()
        .map(|c| format!(" [{}]", c))
        .unwrap_or_default();
    println!(
        "ALERT {} {}{} {} ({})",
        record.timestamp,
        record.level,
        component,
        record.message,
        path.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, EmbeddingConfig};
    use std::io::Write;

    fn config(dir: &std::path::Path) -> Config {
        Config {
            db: DbConfig {
                path: dir.join("logq.sqlite"),
            },
            store: Default::default(),
            ingest: Default::default(),
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                dims: Some(32),
                ..EmbeddingConfig::default()
            },
            llm: Default::default(),
            retrieval: Default::default(),
            server: Default::default(),
        }
    }

    #[tokio::test]
    async fn picks_up_appended_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        let log = logs.join("app.log");
        std::fs::write(&log, "2025-03-14 10:00:00 INFO started\n").unwrap();
        let cfg = config(dir.path());

        let appender = {
            let log = log.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                let mut f = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
                f.write_all(b"2025-03-14 10:00:05 ERROR [db] lost connection\n2025-03-14 10:00:06 INFO half")
                    .unwrap();
            })
        };

        run_watch(&cfg, vec![logs.clone()], Some(1), Some(1))
            .await
            .unwrap();
        appender.await.unwrap();

        let backend = Backend::open(&cfg).await.unwrap();
        // The unterminated line waits for its newline.
        assert_eq!(backend.adapter.count().await.unwrap(), 2);
        let cursor = load_cursor(&backend, &log).await.unwrap();
        assert_eq!(cursor.line, 2);
        backend.close().await;
    }

    #[tokio::test]
    async fn catch_up_leaves_unterminated_line_for_later() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        let log = logs.join("app.log");
        std::fs::write(&log, "2025-03-14 10:00:00 INFO started\n2025-03-14 10:00:01 ERROR pay").unwrap();
        let cfg = config(dir.path());

        run_watch(&cfg, vec![logs.clone()], Some(1), Some(0))
            .await
            .unwrap();

        let backend = Backend::open(&cfg).await.unwrap();
        assert_eq!(backend.adapter.count().await.unwrap(), 1);
        let cursor = load_cursor(&backend, &log).await.unwrap();
        assert_eq!(cursor.line, 1);
        assert_eq!(cursor.offset, "2025-03-14 10:00:00 INFO started\n".len() as u64);
        backend.close().await;
    }
}
