//! Log line parser and the lazy [`LogIngestor`].
//!
//! Recognised line shape:
//!
//! ```text
//! 2025-03-14 10:00:00,123 [ERROR] [PaymentService] card declined
//! └──── timestamp ──────┘ └level┘ └─ component ──┘ └─ message ─┘
//! ```
//!
//! - Timestamp: `YYYY-MM-DD HH:MM:SS` (or `T` separator), optional `,mmm`
//!   or `.mmm` fraction.
//! - Level: bare (`ERROR`) or bracketed (`[ERROR]`), aliases per
//!   [`LogLevel::from_token`].
//! - Component: optional, bracketed.
//!
//! Parsing never fails. A line that does not match is wrapped into a
//! record with [`LogLevel::Unknown`] and the whole line as its message,
//! accompanied by a [`ParseWarning`]. The timestamp then comes from the
//! line prefix when one parses, otherwise from the ingestion time.
//!
//! # Example
//!
//! ```rust
//! use log_rag_core::models::LogLevel;
//! use log_rag_core::parse::parse_line;
//!
//! let now = chrono::Utc::now().naive_utc();
//! let parsed = parse_line("2025-03-14 10:00:00 ERROR db connection failed", 1, now);
//! assert_eq!(parsed.record.level, LogLevel::Error);
//! assert_eq!(parsed.record.message, "db connection failed");
//! assert!(parsed.warning.is_none());
//! ```

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use thiserror::Error;

use crate::models::{LogLevel, LogRecord};

/// Why a line fell back to an `UNKNOWN` record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    #[error("line {line}: no timestamp prefix")]
    MissingTimestamp { line: usize },
    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },
    #[error("line {line}: unrecognised level '{value}'")]
    UnknownLevel { line: usize, value: String },
}

/// Output of [`parse_line`]: always a record, sometimes a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub record: LogRecord,
    pub warning: Option<ParseWarning>,
}

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<ts>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?)\s+(?:\[(?P<level1>[A-Za-z]+)\]|(?P<level2>[A-Za-z]+))(?:\s+\[(?P<component>[^\]]+)\])?(?:\s+(?P<message>.*))?$",
        )
        .expect("log line pattern is valid")
    })
}

fn timestamp_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?")
            .expect("timestamp pattern is valid")
    })
}

/// Parse a timestamp token as written in a log line.
pub fn parse_timestamp(token: &str) -> Option<NaiveDateTime> {
    let normalized = token.replacen('T', " ", 1).replace(',', ".");
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f").ok()
}

/// Parse a single raw line.
///
/// `line` is the 1-based line number used in warnings; `ingested_at` is
/// the fallback timestamp for lines without one.
pub fn parse_line(raw: &str, line: usize, ingested_at: NaiveDateTime) -> ParsedLine {
    let raw_line = raw.trim_end_matches(['\r', '\n']).to_string();
    let trimmed = raw_line.trim();

    if let Some(caps) = line_regex().captures(trimmed) {
        let ts_token = &caps["ts"];
        let level_token = caps
            .name("level1")
            .or_else(|| caps.name("level2"))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match (parse_timestamp(ts_token), LogLevel::from_token(level_token)) {
            (Some(timestamp), Some(level)) => {
                let record = LogRecord {
                    timestamp,
                    level,
                    component: caps.name("component").map(|m| m.as_str().trim().to_string()),
                    message: caps
                        .name("message")
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default(),
                    raw_line,
                    timestamp_inferred: false,
                };
                return ParsedLine {
                    record,
                    warning: None,
                };
            }
            (Some(timestamp), None) => {
                let warning = ParseWarning::UnknownLevel {
                    line,
                    value: level_token.to_string(),
                };
                return fallback(raw_line, timestamp, false, warning);
            }
            (None, _) => {
                let warning = ParseWarning::InvalidTimestamp {
                    line,
                    value: ts_token.to_string(),
                };
                return fallback(raw_line, ingested_at, true, warning);
            }
        }
    }

    // No full match: still honour a leading timestamp if there is one.
    if let Some(m) = timestamp_prefix_regex().find(trimmed) {
        if let Some(timestamp) = parse_timestamp(m.as_str()) {
            return fallback(
                raw_line,
                timestamp,
                false,
                ParseWarning::UnknownLevel {
                    line,
                    value: String::new(),
                },
            );
        }
        let warning = ParseWarning::InvalidTimestamp {
            line,
            value: m.as_str().to_string(),
        };
        return fallback(raw_line, ingested_at, true, warning);
    }

    fallback(
        raw_line,
        ingested_at,
        true,
        ParseWarning::MissingTimestamp { line },
    )
}

fn fallback(
    raw_line: String,
    timestamp: NaiveDateTime,
    timestamp_inferred: bool,
    warning: ParseWarning,
) -> ParsedLine {
    ParsedLine {
        record: LogRecord {
            timestamp,
            level: LogLevel::Unknown,
            component: None,
            message: raw_line.clone(),
            raw_line,
            timestamp_inferred,
        },
        warning: Some(warning),
    }
}

/// Lazy, single-pass conversion of raw lines into [`LogRecord`]s.
///
/// Yields exactly one record per input line. Malformed lines are logged
/// at debug level and counted in [`LogIngestor::warnings`]. To restart,
/// build a new ingestor over a fresh read of the source.
pub struct LogIngestor<I> {
    lines: I,
    line: usize,
    ingested_at: NaiveDateTime,
    warnings: usize,
}

impl<I> LogIngestor<I>
where
    I: Iterator<Item = String>,
{
    /// Ingest with the current time as the fallback timestamp.
    pub fn new(lines: impl IntoIterator<Item = String, IntoIter = I>) -> Self {
        Self::with_ingestion_time(lines, chrono::Utc::now().naive_utc())
    }

    pub fn with_ingestion_time(
        lines: impl IntoIterator<Item = String, IntoIter = I>,
        ingested_at: NaiveDateTime,
    ) -> Self {
        Self {
            lines: lines.into_iter(),
            line: 0,
            ingested_at,
            warnings: 0,
        }
    }

    /// Start numbering at `first_line` (for sources resumed mid-file).
    pub fn starting_at_line(mut self, first_line: usize) -> Self {
        self.line = first_line.saturating_sub(1);
        self
    }

    /// Number of lines that fell back to an `UNKNOWN` record so far.
    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl<I> Iterator for LogIngestor<I>
where
    I: Iterator<Item = String>,
{
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        let raw = self.lines.next()?;
        self.line += 1;
        let parsed = parse_line(&raw, self.line, self.ingested_at);
        if let Some(warning) = parsed.warning {
            self.warnings += 1;
            tracing::debug!(%warning, "malformed log line kept as UNKNOWN");
        }
        Some(parsed.record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.lines.size_hint()
    }
}
