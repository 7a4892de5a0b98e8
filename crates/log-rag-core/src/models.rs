//! Core data models used throughout log-rag.
//!
//! These types represent the parsed log records, the embedded entries kept
//! in the vector store, and the question/answer pair that flows through the
//! query pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::filter::TimeFilter;

/// Severity of a log line.
///
/// `Unknown` is reserved for lines the parser could not make sense of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
        LogLevel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::Unknown => "UNKNOWN",
        }
    }

    /// Map a level token found in a log line to a level.
    ///
    /// Accepts the common aliases (`WARNING`, `EXCEPTION`, `CRITICAL`)
    /// case-insensitively. Returns `None` for anything else, including
    /// the literal `UNKNOWN`, which never appears in well-formed input.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" | "EXCEPTION" => Some(LogLevel::Error),
            "FATAL" | "CRITICAL" => Some(LogLevel::Fatal),
            _ => None,
        }
    }

    /// True for levels that should raise an alert when seen in a live log.
    pub fn is_alert(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Fatal)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unknown") {
            return Ok(LogLevel::Unknown);
        }
        LogLevel::from_token(s).ok_or_else(|| {
            format!(
                "unknown log level '{}'. Use trace, debug, info, warn, error, fatal, or unknown.",
                s
            )
        })
    }
}

/// A single parsed log line. Immutable once produced by the ingestor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub component: Option<String>,
    pub message: String,
    pub raw_line: String,
    /// Set when the line carried no usable timestamp and the ingestion
    /// time was used instead.
    pub timestamp_inferred: bool,
}

impl LogRecord {
    /// Stable identifier of the entry this record becomes once embedded.
    pub fn entry_id(&self) -> String {
        entry_id(&self.raw_line)
    }

    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            timestamp: self.timestamp,
            level: self.level,
            component: self.component.clone(),
        }
    }
}

/// Compute the stable identifier of a raw log line.
///
/// The first 16 bytes of the line's SHA-256 digest, rendered as a UUID so
/// that backends which only accept UUID keys can store it unchanged.
/// Identical lines always map to the same id.
pub fn entry_id(raw_line: &str) -> String {
    let digest = Sha256::digest(raw_line.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Filterable metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl EntryMetadata {
    /// Timestamp as Unix milliseconds (log timestamps are treated as UTC).
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.and_utc().timestamp_millis()
    }
}

/// A log line as stored in the vector database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
    /// The original raw line.
    pub text: String,
}

impl EmbeddedEntry {
    pub fn from_record(record: &LogRecord, vector: Vec<f32>) -> Self {
        Self {
            id: record.entry_id(),
            vector,
            metadata: record.metadata(),
            text: record.raw_line.clone(),
        }
    }

    /// Drop the vector, e.g. before returning the entry over HTTP.
    pub fn without_vector(mut self) -> Self {
        self.vector = Vec::new();
        self
    }
}

/// An entry paired with its similarity to the query vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    pub entry: EmbeddedEntry,
    pub score: f32,
}

/// A question about the logs, optionally restricted to a time range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub question: String,
    pub time_filter: Option<TimeFilter>,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            time_filter: None,
        }
    }

    pub fn with_time_filter(mut self, filter: TimeFilter) -> Self {
        self.time_filter = Some(filter);
        self
    }
}

/// The synthesized answer together with the entries it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Retrieved entries in similarity order.
    pub source_entries: Vec<EmbeddedEntry>,
}

impl Answer {
    /// True when retrieval found nothing (the empty-result case).
    pub fn is_empty(&self) -> bool {
        self.source_entries.is_empty()
    }
}
