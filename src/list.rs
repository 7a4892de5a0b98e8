//! `logq list`: the inspection view over stored entries.
//!
//! Prints every stored entry matching the optional level and time filters,
//! oldest first, as a table or as JSON. With `--output` the JSON is written
//! to a file instead of stdout.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use log_rag_core::filter::{EntryFilter, TimeFilter};
use log_rag_core::models::{EmbeddedEntry, LogLevel};

use crate::config::Config;
use crate::runtime::Backend;

#[derive(Serialize)]
struct ListExport<'a> {
    count: usize,
    filter: &'a EntryFilter,
    entries: &'a [EmbeddedEntry],
}

pub struct ListArgs {
    pub levels: Vec<LogLevel>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<usize>,
    pub json: bool,
    pub output: Option<std::path::PathBuf>,
}

/// Build the filter shared by `list`, `stats` and `GET /entries`.
pub fn build_filter(
    levels: &[LogLevel],
    start: Option<&str>,
    end: Option<&str>,
) -> Result<EntryFilter> {
    let mut filter = EntryFilter::all().with_levels(levels.iter().copied());
    if start.is_some() || end.is_some() {
        filter = filter.with_time(TimeFilter::parse(start, end)?);
    }
    Ok(filter)
}

pub async fn run_list(config: &Config, args: ListArgs) -> Result<()> {
    let filter = build_filter(&args.levels, args.start.as_deref(), args.end.as_deref())?;
    let backend = Backend::open_loaded(config).await?;

    let mut entries = backend.adapter.list_all(&filter).await?;
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }

    if let Some(path) = args.output.as_deref() {
        write_export(path, &filter, &entries)?;
    } else if args.json {
        let export = ListExport {
            count: entries.len(),
            filter: &filter,
            entries: &entries,
        };
        println!("{}", serde_json::to_string_pretty(&export)?);
    } else if entries.is_empty() {
        println!("No entries found.");
    } else {
        println!(
            "{:<36}  {:<23}  {:<7}  {:<14}  TEXT",
            "ID", "TIMESTAMP", "LEVEL", "COMPONENT"
        );
        for entry in &entries {
            let meta = &entry.metadata;
            println!(
                "{:<36}  {:<23}  {:<7}  {:<14}  {}",
                entry.id,
                meta.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                meta.level.as_str(),
                meta.component.as_deref().unwrap_or("-"),
                truncate(&entry.text, 120)
            );
        }
        println!();
        println!("{} entries", entries.len());
    }

    backend.close().await;
    Ok(())
}

fn write_export(path: &Path, filter: &EntryFilter, entries: &[EmbeddedEntry]) -> Result<()> {
    let export = ListExport {
        count: entries.len(),
        filter,
        entries,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(&export)?)?;
    eprintln!("Exported {} entries to {}", entries.len(), path.display());
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_long_lines() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn filter_from_args() {
        let f = build_filter(&[LogLevel::Error], Some("2025-01-10"), None).unwrap();
        assert_eq!(f.levels, vec![LogLevel::Error]);
        assert!(f.time.unwrap().end.is_none());
        assert!(build_filter(&[], None, None).unwrap().is_empty());
        assert!(build_filter(&[], Some("soon"), None).is_err());
    }
}
