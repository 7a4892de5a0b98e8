//! `logq stats`: what is stored, by level, component and period.
//!
//! Gives confidence that ingestion is working: entry totals, the covered
//! time span, per-level and per-component breakdowns, a histogram over
//! hourly/daily/weekly/monthly buckets, and how many files have
//! checkpoints.

use anyhow::Result;
use serde::Serialize;

use log_rag_core::filter::EntryFilter;
use log_rag_core::stats::{LogStats, Period};

use crate::checkpoint::count_checkpoints;
use crate::config::Config;
use crate::runtime::Backend;

#[derive(Serialize)]
pub struct StatsReport {
    pub backend: String,
    pub embedding_model: String,
    pub files_tracked: Option<i64>,
    #[serde(flatten)]
    pub stats: LogStats,
}

/// Collect stats for entries matching `filter` (used by CLI and server).
pub async fn collect_stats(
    backend: &Backend,
    filter: &EntryFilter,
    period: Period,
) -> Result<StatsReport> {
    let entries = backend.adapter.list_all(filter).await?;
    let files_tracked = match &backend.pool {
        Some(pool) => Some(count_checkpoints(pool).await?),
        None => None,
    };
    Ok(StatsReport {
        backend: backend.adapter.store().name().to_string(),
        embedding_model: backend.adapter.embedder().model_name().to_string(),
        files_tracked,
        stats: LogStats::collect(&entries, period),
    })
}

pub async fn run_stats(
    config: &Config,
    filter: EntryFilter,
    period: Period,
    json: bool,
) -> Result<()> {
    let backend = Backend::open_loaded(config).await?;
    let report = collect_stats(&backend, &filter, period).await?;
    backend.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let stats = &report.stats;
    println!("log-rag store stats");
    println!("==================");
    println!();
    println!("  Backend:     {}", report.backend);
    if report.backend == "sqlite" {
        let db_size = std::fs::metadata(&config.db.path)
            .map(|m| m.len())
            .unwrap_or(0);
        println!("  Database:    {}", config.db.path.display());
        println!("  Size:        {}", format_bytes(db_size));
    }
    println!("  Model:       {}", report.embedding_model);
    if let Some(files) = report.files_tracked {
        println!("  Files:       {}", files);
    }
    println!();
    println!("  Entries:     {}", stats.total);
    if let (Some(first), Some(last)) = (stats.first, stats.last) {
        println!("  Span:        {} .. {}", first, last);
    }

    print_table("By level", "LEVEL", &stats.by_level);
    print_table("By component", "COMPONENT", &stats.by_component);
    print_table(
        &format!("By period ({})", stats.period),
        "BUCKET",
        &stats.by_period,
    );
    println!();
    Ok(())
}

fn print_table(title: &str, header: &str, rows: &std::collections::BTreeMap<String, usize>) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("  {}:", title);
    println!("  {:<24} {:>8}", header, "COUNT");
    println!("  {}", "-".repeat(33));
    for (key, count) in rows {
        println!("  {:<24} {:>8}", key, count);
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
