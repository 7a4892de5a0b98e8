//! Single-entry retrieval and deletion (`logq get`, `logq delete`).

use anyhow::{bail, Result};

use log_rag_core::models::EmbeddedEntry;

use crate::config::Config;
use crate::runtime::Backend;

/// Fetch an entry by id (used by CLI and server). The vector is dropped.
pub async fn get_entry(backend: &Backend, id: &str) -> Result<Option<EmbeddedEntry>> {
    Ok(backend.adapter.get(id).await?.map(|e| e.without_vector()))
}

pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let backend = Backend::open_loaded(config).await?;
    let entry = get_entry(&backend, id).await?;
    backend.close().await;

    let Some(entry) = entry else {
        bail!("entry not found: {}", id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    let meta = &entry.metadata;
    println!("--- Entry ---");
    println!("id:        {}", entry.id);
    println!("timestamp: {}", meta.timestamp);
    println!("level:     {}", meta.level);
    println!("component: {}", meta.component.as_deref().unwrap_or("-"));
    println!();
    println!("--- Text ---");
    println!("{}", entry.text);
    Ok(())
}

pub async fn run_delete(config: &Config, ids: Vec<String>) -> Result<()> {
    let backend = Backend::open(config).await?;
    let removed = backend.adapter.delete(&ids).await?;
    backend.close().await;

    println!("deleted {} of {} entries", removed, ids.len());
    if removed < ids.len() {
        eprintln!("Warning: {} ids were not found", ids.len() - removed);
    }
    Ok(())
}
