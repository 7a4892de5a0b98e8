//! Ingestion orchestration.
//!
//! Coordinates the flow: file discovery → incremental read → parse →
//! batched embedding and storage. Each batch of `ingest.batch_size`
//! records is one atomic [`VectorStoreAdapter::add`] call; the file's
//! checkpoint advances only after all of its batches are stored.
//!
//! [`VectorStoreAdapter::add`]: log_rag_core::adapter::VectorStoreAdapter::add

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use log_rag_core::models::LogRecord;
use log_rag_core::parse::LogIngestor;

use crate::checkpoint::{get_checkpoint, set_checkpoint, source_key};
use crate::config::Config;
use crate::logfiles::{self, Cursor};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::runtime::Backend;

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Ignore checkpoints and read every file from the start.
    pub full: bool,
    /// Parse and count only; no embedding, no writes, no checkpoints.
    pub dry_run: bool,
    /// Leave a trailing line without newline for the next read. Always on
    /// for checkpointed reads, see [`ingest_paths`].
    pub complete_lines_only: bool,
    /// Keep ERROR/FATAL records in [`IngestReport::alerts`].
    pub collect_alerts: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub lines: usize,
    pub records: usize,
    pub malformed: usize,
    pub entries_written: usize,
    pub batches: usize,
    pub restarted_files: usize,
    pub blank_skipped: usize,
    #[serde(skip)]
    pub alerts: Vec<LogRecord>,
}

impl IngestReport {
    fn absorb(&mut self, other: IngestReport) {
        self.files += other.files;
        self.lines += other.lines;
        self.records += other.records;
        self.malformed += other.malformed;
        self.entries_written += other.entries_written;
        self.batches += other.batches;
        self.restarted_files += other.restarted_files;
        self.blank_skipped += other.blank_skipped;
        self.alerts.extend(other.alerts);
    }
}

/// `logq ingest`: ingest `paths` (or `ingest.paths`) and print a summary.
pub async fn run_ingest(
    config: &Config,
    paths: Vec<PathBuf>,
    full: bool,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let paths = if paths.is_empty() {
        config.ingest.paths.clone()
    } else {
        paths
    };
    let backend = Backend::open(config).await?;
    let options = IngestOptions {
        full,
        dry_run,
        ..IngestOptions::default()
    };
    let reporter = progress.reporter();
    let report = ingest_paths(&backend, config, &paths, &options, reporter.as_ref()).await?;

    if dry_run {
        println!("ingest (dry-run)");
    } else {
        println!("ingest");
    }
    println!("  files: {}", report.files);
    println!("  lines read: {}", report.lines);
    println!("  records: {}", report.records);
    println!("  malformed lines: {}", report.malformed);
    if !dry_run {
        println!("  entries written: {}", report.entries_written);
        if report.blank_skipped > 0 {
            println!("  blank lines skipped: {}", report.blank_skipped);
        }
        println!("  embedding model: {}", backend.adapter.embedder().model_name());
    }
    if report.restarted_files > 0 {
        println!("  truncated files re-read: {}", report.restarted_files);
    }
    if backend.pool.is_none() && !dry_run {
        eprintln!("Warning: store.backend = \"memory\" keeps nothing after this command exits.");
    }
    println!("ok");

    backend.close().await;
    Ok(())
}

/// Ingest every file under `paths`, resuming from checkpoints unless
/// `options.full` is set.
///
/// A read that advances a stored checkpoint stops at the last newline: a
/// line still being written is picked up whole on the next pass instead of
/// being stored as two fragments. `--full`, `--dry-run`, and the memory
/// backend keep no checkpoint and read the unterminated tail too.
pub async fn ingest_paths(
    backend: &Backend,
    config: &Config,
    paths: &[PathBuf],
    options: &IngestOptions,
    reporter: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    reporter.report(IngestProgressEvent::Discovering);
    let files = logfiles::discover(paths, &config.ingest)?;
    let total = files.len() as u64;

    let checkpointed = backend.pool.is_some() && !options.full && !options.dry_run;
    let options = IngestOptions {
        complete_lines_only: options.complete_lines_only || checkpointed,
        ..options.clone()
    };

    let mut report = IngestReport::default();
    for (i, path) in files.iter().enumerate() {
        reporter.report(IngestProgressEvent::File {
            path: path.display().to_string(),
            n: i as u64 + 1,
            total,
        });

        let key = source_key(path);
        let start = match (&backend.pool, options.full || options.dry_run) {
            (Some(pool), false) => get_checkpoint(pool, &key).await?.unwrap_or_default(),
            _ => Cursor::default(),
        };

        let (file_report, next) =
            ingest_file(backend, config, path, start, &options, reporter).await?;
        report.absorb(file_report);

        if let (Some(pool), false) = (&backend.pool, options.dry_run) {
            set_checkpoint(pool, &key, next).await?;
        }
    }
    Ok(report)
}

/// Ingest the part of `path` after `start`. Returns the cursor to resume
/// from.
pub async fn ingest_file(
    backend: &Backend,
    config: &Config,
    path: &Path,
    start: Cursor,
    options: &IngestOptions,
    reporter: &dyn IngestProgressReporter,
) -> Result<(IngestReport, Cursor)> {
    let chunk = logfiles::read_from(path, start, options.complete_lines_only)?;
    let mut report = IngestReport {
        files: 1,
        ..IngestReport::default()
    };
    if chunk.restarted {
        tracing::warn!(path = %path.display(), "file shrank since last read; reading from the start");
        report.restarted_files = 1;
    }

    let lines_read = chunk.lines.len();
    let now = chrono::Utc::now().naive_utc();
    let mut ingestor =
        LogIngestor::with_ingestion_time(chunk.lines, now).starting_at_line(chunk.first_line);
    let batch_size = config.ingest.batch_size;
    let mut batch: Vec<LogRecord> = Vec::with_capacity(batch_size);

    loop {
        let record = ingestor.next();
        let done = record.is_none();
        if let Some(record) = record {
            if options.collect_alerts && record.level.is_alert() {
                report.alerts.push(record.clone());
            }
            batch.push(record);
        }

        if batch.len() >= batch_size || (done && !batch.is_empty()) {
            report.records += batch.len();
            if !options.dry_run {
                let summary = backend.adapter.add(&batch).await?;
                report.entries_written += summary.entries_written;
                report.batches += summary.batches;
                report.blank_skipped += summary.skipped_blank;
                reporter.report(IngestProgressEvent::Stored {
                    path: path.display().to_string(),
                    records: report.records as u64,
                });
            }
            batch.clear();
        }
        if done {
            break;
        }
    }

    report.lines = lines_read;
    report.malformed = ingestor.warnings();
    if report.malformed > 0 {
        tracing::warn!(
            path = %path.display(),
            malformed = report.malformed,
            "lines without a recognizable timestamp/level were kept as UNKNOWN"
        );
    }
    Ok((report, chunk.next))
}
