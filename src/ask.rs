//! `logq ask`: answer a question from the stored logs.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use log_rag_core::filter::TimeFilter;
use log_rag_core::models::{Answer, EmbeddedEntry, Query};

use crate::config::Config;
use crate::runtime::Backend;

/// Response body shared by `logq ask --json` and `POST /ask`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer_text: String,
    pub source_entries: Vec<EmbeddedEntry>,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer_text: answer.text,
            source_entries: answer
                .source_entries
                .into_iter()
                .map(EmbeddedEntry::without_vector)
                .collect(),
        }
    }
}

pub struct AskArgs {
    pub question: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub top_k: Option<usize>,
    pub infer_filters: bool,
    pub json: bool,
}

pub async fn run_ask(config: &Config, args: AskArgs) -> Result<()> {
    if args.top_k == Some(0) {
        bail!("--top-k must be >= 1");
    }
    let mut query = Query::new(args.question);
    if args.start.is_some() || args.end.is_some() {
        let filter = TimeFilter::parse(args.start.as_deref(), args.end.as_deref())?;
        query = query.with_time_filter(filter);
    }

    let backend = Backend::open_loaded(config).await?;
    let mut pipeline = backend.pipeline(config)?;
    if let Some(k) = args.top_k {
        pipeline = pipeline.with_top_k(k);
    }
    if args.infer_filters {
        pipeline = pipeline.with_filter_inference(true);
    }

    let answer = pipeline.answer(&query).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&AskResponse::from(answer))?
        );
    } else {
        println!("{}", answer.text);
        println!();
        if answer.is_empty() {
            println!("sources: none (no entries matched)");
        } else {
            println!("sources ({}):", answer.source_entries.len());
            for (i, entry) in answer.source_entries.iter().enumerate() {
                println!("  {}. {}", i + 1, entry.text);
            }
        }
    }

    backend.close().await;
    Ok(())
}
