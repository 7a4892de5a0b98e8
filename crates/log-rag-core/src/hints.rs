//! Filter inference from natural-language questions.
//!
//! Recognizes a small set of phrases and turns them into an
//! [`EntryFilter`]:
//!
//! | Phrase | Filter |
//! |--------|--------|
//! | `last 24 hours`, `past 24 hours`, `last day` | `now - 24h ..= now` |
//! | `last week` | previous Monday 00:00 ..= Sunday 23:59:59 |
//! | `last month` | `now - 30 days ..= now` |
//! | `March 2025`, `in march` | that calendar month (current year if omitted) |
//! | `error(s)`, `exception(s)` | level `ERROR` |
//! | `warning(s)`, `warn` | level `WARN` |
//! | `info`, `debug`, `trace` | that level |
//! | `fatal`, `critical` | level `FATAL` |
//!
//! Anything else is left unfiltered.
//!
//! [`infer_intent`] separately spots questions the store can answer by
//! itself: "how many error logs", "count warn logs" and similar are counts,
//! "show errors", "list all logs" and similar are listings.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::filter::{EntryFilter, TimeFilter};
use crate::models::LogLevel;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// What kind of reply a question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Exact number of entries at one level.
    Count(LogLevel),
    /// The matching entries themselves.
    Show,
    /// Anything else: retrieval plus the language model.
    Answer,
}

fn count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:how many|count|number of|total)\s+(\w+)\s+logs\b")
            .expect("count pattern is valid")
    })
}

fn show_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:show|display|list|get)\s+(?:all\s+)?(?:logs|errors?|exceptions?|warnings?|infos?)\b",
        )
        .expect("show pattern is valid")
    })
}

/// Classify `question`. Listing phrases win over counting ones; a count
/// needs a known level word ("how many error logs").
pub fn infer_intent(question: &str) -> QueryIntent {
    let lower = question.to_lowercase();
    if show_regex().is_match(&lower) {
        return QueryIntent::Show;
    }
    count_regex()
        .captures(&lower)
        .and_then(|caps| LogLevel::from_token(&caps[1]))
        .map_or(QueryIntent::Answer, QueryIntent::Count)
}

/// Infer a filter from `question`, relative to `now`.
pub fn infer_filter(question: &str, now: NaiveDateTime) -> EntryFilter {
    let lower = question.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut filter = EntryFilter::all();
    if let Some(time) = infer_time(&lower, &words, now) {
        filter = filter.with_time(time);
    }
    let levels = infer_levels(&words);
    if !levels.is_empty() {
        filter = filter.with_levels(levels);
    }
    filter
}

fn infer_time(lower: &str, words: &[&str], now: NaiveDateTime) -> Option<TimeFilter> {
    if lower.contains("last 24 hours")
        || lower.contains("past 24 hours")
        || lower.contains("last day")
    {
        return Some(TimeFilter::between(now - Duration::hours(24), now));
    }
    if lower.contains("last week") {
        let today = now.date();
        let this_monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let start = this_monday - Duration::days(7);
        let end = this_monday - Duration::days(1);
        return Some(TimeFilter::between(start_of(start), end_of(end)));
    }
    if lower.contains("last month") || lower.contains("past month") {
        return Some(TimeFilter::between(now - Duration::days(30), now));
    }
    month_range(words, now)
}

fn month_range(words: &[&str], now: NaiveDateTime) -> Option<TimeFilter> {
    for (i, word) in words.iter().enumerate() {
        let Some(month0) = MONTHS.iter().position(|m| m == word || m[..3] == **word) else {
            continue;
        };
        let year = words
            .get(i + 1)
            .and_then(|w| w.parse::<i32>().ok())
            .filter(|y| (1970..=9999).contains(y));

        // "may" is too common a word to count without a year.
        if *word == "may" && year.is_none() {
            continue;
        }

        let month = month0 as u32 + 1;
        let year = year.unwrap_or_else(|| {
            if month > now.month() {
                now.year() - 1
            } else {
                now.year()
            }
        });
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        return Some(TimeFilter::between(
            start_of(first),
            end_of(next - Duration::days(1)),
        ));
    }
    None
}

fn infer_levels(words: &[&str]) -> Vec<LogLevel> {
    let mut levels = Vec::new();
    for word in words {
        let level = match *word {
            "error" | "errors" | "exception" | "exceptions" => LogLevel::Error,
            "warning" | "warnings" | "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            "fatal" | "critical" => LogLevel::Fatal,
            _ => continue,
        };
        levels.push(level);
    }
    levels
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
}
