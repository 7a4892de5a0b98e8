//! Metadata predicates applied by vector store backends.
//!
//! [`TimeFilter`] is the inclusive time range a question may be restricted
//! to. [`EntryFilter`] combines it with an optional set of levels; each
//! backend translates it into its own predicate form (SQL `WHERE`, Qdrant
//! payload filter, or [`EntryFilter::matches`] for in-memory scans).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::RagError;
use crate::models::{EntryMetadata, LogLevel};

/// Inclusive time range. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeFilter {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Which side of a range a textual bound is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

impl TimeFilter {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: NaiveDateTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Parse optional textual bounds (see [`parse_bound`]).
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, RagError> {
        Ok(Self {
            start: start.map(|s| parse_bound(s, Bound::Start)).transpose()?,
            end: end.map(|s| parse_bound(s, Bound::End)).transpose()?,
        })
    }

    /// A range whose start lies after its end can never match.
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }

    pub fn start_millis(&self) -> Option<i64> {
        self.start.map(|s| s.and_utc().timestamp_millis())
    }

    pub fn end_millis(&self) -> Option<i64> {
        self.end.map(|e| e.and_utc().timestamp_millis())
    }
}

/// Parse one bound of a time range.
///
/// Accepted forms:
/// - `YYYY-MM-DD`: start of day for [`Bound::Start`], last instant of the
///   day for [`Bound::End`], so a date-only range is inclusive of both days.
/// - `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`, optionally with
///   fractional seconds.
/// - RFC 3339 with an offset (converted to UTC).
pub fn parse_bound(value: &str, bound: Bound) -> Result<NaiveDateTime, RagError> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let ts = match bound {
            Bound::Start => date.and_hms_opt(0, 0, 0),
            Bound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
        };
        return ts.ok_or_else(|| RagError::InvalidFilter(format!("invalid date '{}'", value)));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.naive_utc());
    }

    Err(RagError::InvalidFilter(format!(
        "cannot parse '{}' as a date or timestamp (expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)",
        value
    )))
}

/// Metadata predicate for store queries. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryFilter {
    pub time: Option<TimeFilter>,
    /// Empty means any level.
    pub levels: Vec<LogLevel>,
}

impl EntryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_time(time: Option<TimeFilter>) -> Self {
        Self {
            time,
            levels: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: TimeFilter) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = levels.into_iter().collect();
        self.levels.sort();
        self.levels.dedup();
        self
    }

    /// True when no entry can satisfy the filter (inverted time range).
    pub fn is_unsatisfiable(&self) -> bool {
        self.time.map_or(false, |t| t.is_inverted())
    }

    pub fn is_empty(&self) -> bool {
        self.time.map_or(true, |t| t.is_open()) && self.levels.is_empty()
    }

    pub fn matches(&self, meta: &EntryMetadata) -> bool {
        if let Some(time) = &self.time {
            if !time.contains(meta.timestamp) {
                return false;
            }
        }
        self.levels.is_empty() || self.levels.contains(&meta.level)
    }
}
