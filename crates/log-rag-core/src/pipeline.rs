//! Question answering over stored log entries.
//!
//! # Steps
//!
//! 1. Build the metadata filter from the query's time range (and, when
//!    enabled, from phrases in the question; see [`crate::hints`]).
//! 2. Embed the question with the adapter's embedding provider, so the
//!    question shares the ingestion embedding space.
//! 3. Retrieve the top-K entries under the filter.
//! 4. Build the prompt from the entries' raw text and the question.
//! 5. Call the language model once and pair its reply with the entries.
//!
//! An inverted time range skips steps 2-3: the context is empty and the
//! model is asked anyway, which produces a "no relevant logs" answer.
//!
//! With filter inference on, counting questions ("how many error logs")
//! and listing questions ("show errors from March 2025") are answered
//! straight from the store's metadata; see [`crate::hints::infer_intent`].
//! Neither embeds the question nor calls the language model.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::adapter::VectorStoreAdapter;
use crate::error::RagError;
use crate::filter::EntryFilter;
use crate::hints::{infer_filter, infer_intent, QueryIntent};
use crate::llm::LanguageModel;
use crate::models::{Answer, EmbeddedEntry, Query, ScoredEntry};
use crate::prompt::build_prompt;

/// Default number of retrieved entries.
pub const DEFAULT_TOP_K: usize = 20;

/// Example entries returned with a count.
pub const COUNT_EXAMPLES: usize = 5;

/// Entries returned by a listing question.
pub const SHOW_LIMIT: usize = 20;

#[derive(Clone)]
pub struct QueryPipeline {
    adapter: VectorStoreAdapter,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
    infer_filters: bool,
}

impl QueryPipeline {
    pub fn new(adapter: VectorStoreAdapter, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            adapter,
            llm,
            top_k: DEFAULT_TOP_K,
            infer_filters: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter_inference(mut self, enabled: bool) -> Self {
        self.infer_filters = enabled;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn adapter(&self) -> &VectorStoreAdapter {
        &self.adapter
    }

    /// Filter applied to `query`.
    ///
    /// An explicit time filter always wins over an inferred one; inferred
    /// levels are kept either way.
    pub fn filter_for(&self, query: &Query, now: NaiveDateTime) -> EntryFilter {
        let mut filter = if self.infer_filters {
            infer_filter(&query.question, now)
        } else {
            EntryFilter::all()
        };
        if let Some(time) = query.time_filter {
            filter.time = Some(time);
        }
        filter
    }

    /// Answer `query`, using the current UTC time for relative phrases.
    pub async fn answer(&self, query: &Query) -> Result<Answer, RagError> {
        let mut filter = self.filter_for(query, chrono::Utc::now().naive_utc());
        if self.infer_filters {
            match infer_intent(&query.question) {
                QueryIntent::Count(level) => {
                    filter.levels = vec![level];
                    return self.count(&filter).await;
                }
                QueryIntent::Show => return self.show(&filter).await,
                QueryIntent::Answer => {}
            }
        }
        self.answer_filtered(&query.question, &filter).await
    }

    /// Exact number of entries under `filter`, with the first
    /// [`COUNT_EXAMPLES`] as sources.
    pub async fn count(&self, filter: &EntryFilter) -> Result<Answer, RagError> {
        let mut entries = self.adapter.list_all(filter).await?;
        let total = entries.len();
        let what = describe(filter);
        tracing::debug!(total, "answering count from the store");

        let text = if total == 0 {
            format!("There are no{} logs.", what)
        } else {
            entries.truncate(COUNT_EXAMPLES);
            let mut text = format!(
                "There are exactly {}{} logs. Here are some examples:\n",
                total, what
            );
            for (i, entry) in entries.iter().enumerate() {
                text.push_str(&format!("\nExample {}: {}", i + 1, entry.text));
            }
            text
        };
        Ok(Answer {
            text,
            source_entries: entries,
        })
    }

    /// The entries under `filter` in time order, at most [`SHOW_LIMIT`].
    pub async fn show(&self, filter: &EntryFilter) -> Result<Answer, RagError> {
        let mut entries = self.adapter.list_all(filter).await?;
        let total = entries.len();
        let what = describe(filter);

        let text = if total == 0 {
            format!("No{} logs found.", what)
        } else {
            entries.truncate(SHOW_LIMIT);
            let mut text = format!("Showing {} of {}{} logs:\n", entries.len(), total, what);
            for (i, entry) in entries.iter().enumerate() {
                text.push_str(&format!("\n{}. {}", i + 1, entry.text));
            }
            if total > SHOW_LIMIT {
                text.push_str("\n\nRefine the question to narrow the listing.");
            }
            text
        };
        Ok(Answer {
            text,
            source_entries: entries,
        })
    }

    /// Answer `question` under an explicit filter.
    pub async fn answer_filtered(
        &self,
        question: &str,
        filter: &EntryFilter,
    ) -> Result<Answer, RagError> {
        let scored = self.retrieve(question, filter).await?;
        let entries: Vec<EmbeddedEntry> = scored.into_iter().map(|s| s.entry).collect();

        let prompt = build_prompt(question, &entries, filter);
        tracing::debug!(
            sources = entries.len(),
            prompt_bytes = prompt.len(),
            model = self.llm.model_name(),
            "generating answer"
        );
        let text = self
            .llm
            .generate(&prompt)
            .await
            .map_err(RagError::language_model)?;

        Ok(Answer {
            text: text.trim().to_string(),
            source_entries: entries,
        })
    }

    /// Retrieval only: embed `question` and return the top-K scored entries.
    pub async fn retrieve(
        &self,
        question: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<ScoredEntry>, RagError> {
        if filter.is_unsatisfiable() || self.top_k == 0 {
            tracing::debug!("filter can never match; skipping retrieval");
            return Ok(Vec::new());
        }
        let vector = self
            .adapter
            .embedder()
            .embed_one(question)
            .await
            .map_err(RagError::embedding)?;
        self.adapter.query(&vector, filter, self.top_k).await
    }
}

/// " ERROR between ... and ..." style qualifier for count/show replies.
fn describe(filter: &EntryFilter) -> String {
    let mut out = String::new();
    for level in &filter.levels {
        out.push(' ');
        out.push_str(level.as_str());
    }
    if let Some(time) = &filter.time {
        match (time.start, time.end) {
            (Some(s), Some(e)) => out.push_str(&format!(" logged between {} and {}", s, e)),
            (Some(s), None) => out.push_str(&format!(" logged since {}", s)),
            (None, Some(e)) => out.push_str(&format!(" logged until {}", e)),
            (None, None) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use crate::filter::TimeFilter;
    use crate::models::LogLevel;
    use crate::parse::parse_line;
    use crate::store::memory::InMemoryStore;
    use crate::testing::{FailingEmbedder, FailingModel, RecordingModel};

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    async fn seeded(lines: &[&str]) -> VectorStoreAdapter {
        let adapter = VectorStoreAdapter::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(HashingProvider::new(128)),
        );
        let records: Vec<_> = lines
            .iter()
            .enumerate()
            .map(|(i, l)| parse_line(l, i + 1, now()).record)
            .collect();
        adapter.add(&records).await.unwrap();
        adapter
    }

    const MIXED: [&str; 5] = [
        "2025-01-10 09:00:00 ERROR payment gateway timeout",
        "2025-01-11 09:00:00 INFO user login ok",
        "2025-01-12 09:00:00 ERROR db connection failed",
        "2025-01-13 09:00:00 INFO cache warmed",
        "2025-01-20 09:00:00 ERROR disk full",
    ];

    #[tokio::test]
    async fn all_errors_retrievable_when_k_covers_store() {
        let model = Arc::new(RecordingModel::new("There are 3 errors."));
        let pipeline = QueryPipeline::new(seeded(&MIXED).await, model.clone()).with_top_k(5);

        let answer = pipeline
            .answer(&Query::new("How many ERROR logs are there?"))
            .await
            .unwrap();
        assert_eq!(answer.text, "There are 3 errors.");
        let errors = answer
            .source_entries
            .iter()
            .filter(|e| e.metadata.level == LogLevel::Error)
            .count();
        assert_eq!(errors, 3);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("2025-01-12 09:00:00 ERROR db connection failed"));
    }

    #[tokio::test]
    async fn time_filter_is_inclusive() {
        let model = Arc::new(RecordingModel::new("ok"));
        let pipeline = QueryPipeline::new(seeded(&MIXED).await, model);
        let window = TimeFilter::parse(Some("2025-01-10"), Some("2025-01-15")).unwrap();
        let answer = pipeline
            .answer(&Query::new("what happened?").with_time_filter(window))
            .await
            .unwrap();
        assert_eq!(answer.source_entries.len(), 4);
        assert!(answer
            .source_entries
            .iter()
            .all(|e| window.contains(e.metadata.timestamp)));
    }

    #[tokio::test]
    async fn inverted_range_is_empty_result_not_error() {
        let model = Arc::new(RecordingModel::new("No relevant logs found."));
        let adapter = VectorStoreAdapter::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(FailingEmbedder::always()),
        );
        let pipeline = QueryPipeline::new(adapter, model.clone());
        let inverted = TimeFilter::parse(Some("2025-01-15"), Some("2025-01-10")).unwrap();
        let answer = pipeline
            .answer(&Query::new("errors?").with_time_filter(inverted))
            .await
            .unwrap();
        assert!(answer.is_empty());
        assert!(model.prompts()[0].contains("none matched"));
    }

    #[tokio::test]
    async fn model_failure_surfaces() {
        let pipeline = QueryPipeline::new(seeded(&MIXED).await, Arc::new(FailingModel));
        let err = pipeline.answer(&Query::new("errors?")).await.unwrap_err();
        assert!(err.is_service_unavailable());
        assert!(err.to_string().contains("language model"));
    }

    #[tokio::test]
    async fn embedding_failure_surfaces() {
        let adapter = VectorStoreAdapter::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(FailingEmbedder::always()),
        );
        let pipeline = QueryPipeline::new(adapter, Arc::new(RecordingModel::new("x")));
        let err = pipeline.answer(&Query::new("errors?")).await.unwrap_err();
        assert!(err.to_string().contains("embedding"));
    }

    #[tokio::test]
    async fn count_question_is_answered_from_the_store() {
        let model = Arc::new(RecordingModel::new("unused"));
        let pipeline =
            QueryPipeline::new(seeded(&MIXED).await, model.clone()).with_filter_inference(true);

        let answer = pipeline
            .answer(&Query::new("How many error logs are there?"))
            .await
            .unwrap();
        assert!(answer.text.starts_with("There are exactly 3 ERROR logs."));
        assert!(answer.text.contains("Example 1: 2025-01-10 09:00:00 ERROR payment gateway timeout"));
        assert_eq!(answer.source_entries.len(), 3);

        let answer = pipeline
            .answer(&Query::new("count debug logs"))
            .await
            .unwrap();
        assert_eq!(answer.text, "There are no DEBUG logs.");
        assert!(answer.is_empty());

        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn count_keeps_only_five_examples() {
        let lines: Vec<String> = (0..8)
            .map(|i| format!("2025-01-10 09:00:0{} WARN retry {}", i, i))
            .collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let pipeline = QueryPipeline::new(seeded(&lines).await, Arc::new(FailingModel))
            .with_filter_inference(true);

        let answer = pipeline
            .answer(&Query::new("total warning logs"))
            .await
            .unwrap();
        assert!(answer.text.starts_with("There are exactly 8 WARN logs."));
        assert_eq!(answer.source_entries.len(), COUNT_EXAMPLES);
    }

    #[tokio::test]
    async fn show_question_lists_entries_in_time_order() {
        let model = Arc::new(RecordingModel::new("unused"));
        let pipeline =
            QueryPipeline::new(seeded(&MIXED).await, model.clone()).with_filter_inference(true);
        let window = TimeFilter::parse(Some("2025-01-11"), Some("2025-01-31")).unwrap();

        let answer = pipeline
            .answer(&Query::new("show errors").with_time_filter(window))
            .await
            .unwrap();
        let texts: Vec<&str> = answer.source_entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "2025-01-12 09:00:00 ERROR db connection failed",
                "2025-01-20 09:00:00 ERROR disk full",
            ]
        );
        assert!(answer.text.starts_with("Showing 2 of 2 ERROR logs logged between"));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn count_phrasing_without_inference_goes_to_the_model() {
        let model = Arc::new(RecordingModel::new("three"));
        let pipeline = QueryPipeline::new(seeded(&MIXED).await, model.clone());
        let answer = pipeline
            .answer(&Query::new("how many error logs"))
            .await
            .unwrap();
        assert_eq!(answer.text, "three");
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn explicit_time_filter_beats_inferred() {
        let model = Arc::new(RecordingModel::new("ok"));
        let pipeline = QueryPipeline::new(seeded(&MIXED).await, model).with_filter_inference(true);
        let window = TimeFilter::parse(Some("2025-01-01"), Some("2025-01-31")).unwrap();
        let q = Query::new("errors in the last 24 hours").with_time_filter(window);
        let filter = pipeline.filter_for(&q, now());
        assert_eq!(filter.time, Some(window));
        assert_eq!(filter.levels, vec![LogLevel::Error]);

        let answer = pipeline.answer_filtered(&q.question, &filter).await.unwrap();
        assert_eq!(answer.source_entries.len(), 3);
    }
}
