//! Aggregate counts over stored entries.
//!
//! Backs `logq stats` and `GET /stats`: totals by level, by component, and
//! by time bucket.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::Serialize;

use crate::models::EmbeddedEntry;

/// Time bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Label of the bucket containing `ts`. Weekly buckets are keyed by
    /// their Monday.
    pub fn bucket(&self, ts: NaiveDateTime) -> String {
        match self {
            Period::Hourly => ts.format("%Y-%m-%d %H:00").to_string(),
            Period::Daily => ts.format("%Y-%m-%d").to_string(),
            Period::Weekly => {
                let date = ts.date();
                let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
                format!("week of {}", monday.format("%Y-%m-%d"))
            }
            Period::Monthly => ts.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::Hourly => "hourly",
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Ok(Period::Hourly),
            "daily" | "day" => Ok(Period::Daily),
            "weekly" | "week" => Ok(Period::Weekly),
            "monthly" | "month" => Ok(Period::Monthly),
            other => Err(format!(
                "unknown period '{}'. Use hourly, daily, weekly, or monthly.",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogStats {
    pub total: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub by_level: BTreeMap<String, usize>,
    pub by_component: BTreeMap<String, usize>,
    pub period: Period,
    pub by_period: BTreeMap<String, usize>,
}

impl LogStats {
    pub fn collect<'a>(entries: impl IntoIterator<Item = &'a EmbeddedEntry>, period: Period) -> Self {
        let mut stats = LogStats {
            total: 0,
            first: None,
            last: None,
            by_level: BTreeMap::new(),
            by_component: BTreeMap::new(),
            period,
            by_period: BTreeMap::new(),
        };

        for entry in entries {
            let meta = &entry.metadata;
            stats.total += 1;
            stats.first = Some(stats.first.map_or(meta.timestamp, |f| f.min(meta.timestamp)));
            stats.last = Some(stats.last.map_or(meta.timestamp, |l| l.max(meta.timestamp)));
            *stats.by_level.entry(meta.level.to_string()).or_default() += 1;
            let component = meta.component.as_deref().unwrap_or("-");
            *stats.by_component.entry(component.to_string()).or_default() += 1;
            *stats.by_period.entry(period.bucket(meta.timestamp)).or_default() += 1;
        }
        stats
    }
}
