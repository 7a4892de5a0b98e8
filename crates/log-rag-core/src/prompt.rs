//! Prompt assembly for answer synthesis.

use crate::filter::EntryFilter;
use crate::models::EmbeddedEntry;

/// Reply the model is told to give when the context does not cover the
/// question.
pub const NO_LOGS_REPLY: &str = "No relevant logs found.";

const INSTRUCTIONS: &str = "You are a log analysis assistant. Answer the question using only the \
log entries listed below. Quote timestamps and levels when they support your answer. Do not \
invent entries or details that are not present in the logs.";

/// Build the single prompt sent to the language model.
///
/// Retrieved entries are embedded verbatim, one per line, in similarity
/// order. When `entries` is empty the prompt states that nothing matched so
/// the model answers with [`NO_LOGS_REPLY`].
pub fn build_prompt(question: &str, entries: &[EmbeddedEntry], filter: &EntryFilter) -> String {
    let mut prompt = String::with_capacity(256 + entries.iter().map(|e| e.text.len() + 1).sum::<usize>());
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str(&format!(
        " If the entries do not contain the answer, reply exactly: \"{}\"\n\n",
        NO_LOGS_REPLY
    ));

    if let Some(scope) = describe_filter(filter) {
        prompt.push_str(&format!("Entries were restricted to {}.\n\n", scope));
    }

    if entries.is_empty() {
        prompt.push_str("Log entries: none matched this question.\n\n");
    } else {
        prompt.push_str(&format!("Log entries ({}):\n", entries.len()));
        for entry in entries {
            prompt.push_str(&entry.text);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("Question: ");
    prompt.push_str(question.trim());
    prompt.push_str("\nAnswer:");
    prompt
}

fn describe_filter(filter: &EntryFilter) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(time) = &filter.time {
        match (time.start, time.end) {
            (Some(s), Some(e)) => parts.push(format!("timestamps from {} to {}", s, e)),
            (Some(s), None) => parts.push(format!("timestamps from {}", s)),
            (None, Some(e)) => parts.push(format!("timestamps up to {}", e)),
            (None, None) => {}
        }
    }
    if !filter.levels.is_empty() {
        let levels: Vec<&str> = filter.levels.iter().map(|l| l.as_str()).collect();
        parts.push(format!("levels {}", levels.join(", ")));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" and "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TimeFilter;
    use crate::models::{EntryMetadata, LogLevel};
    use chrono::NaiveDateTime;

    fn entry(text: &str) -> EmbeddedEntry {
        EmbeddedEntry {
            id: crate::models::entry_id(text),
            vector: Vec::new(),
            metadata: EntryMetadata {
                timestamp: NaiveDateTime::parse_from_str("2025-03-14 10:00:00", "%Y-%m-%d %H:%M:%S")
                    .unwrap(),
                level: LogLevel::Error,
                component: None,
            },
            text: text.to_string(),
        }
    }

    #[test]
    fn entries_embedded_verbatim_in_order() {
        let a = "2025-03-14 10:00:00 ERROR db connection failed";
        let b = "2025-03-14 10:00:05 ERROR   retry   exhausted";
        let p = build_prompt("What failed?", &[entry(a), entry(b)], &EntryFilter::all());
        let ia = p.find(a).unwrap();
        let ib = p.find(b).unwrap();
        assert!(ia < ib);
        assert!(p.ends_with("Question: What failed?\nAnswer:"));
    }

    #[test]
    fn empty_context_mentions_no_match() {
        let p = build_prompt("Anything?", &[], &EntryFilter::all());
        assert!(p.contains("none matched"));
        assert!(p.contains(NO_LOGS_REPLY));
    }

    #[test]
    fn filter_scope_described() {
        let f = EntryFilter::from_time(Some(
            TimeFilter::parse(Some("2025-01-10"), None).unwrap(),
        ))
        .with_levels([LogLevel::Error]);
        let p = build_prompt("q", &[], &f);
        assert!(p.contains("timestamps from 2025-01-10 00:00:00"));
        assert!(p.contains("levels ERROR"));
    }
}
